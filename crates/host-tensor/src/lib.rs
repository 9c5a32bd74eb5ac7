// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # host-tensor
//!
//! Host-side tensor types for the snps_ev runtime.
//!
//! - [`HostTensor`] — an owned, row-major byte buffer with a shape and dtype.
//!   Graph inputs are copied *from* one, graph outputs *into* one.
//! - [`Shape`] — tensor dimensions.
//! - [`DType`] — element types, parsed from the DLPack-style names used by
//!   graph program descriptions (`"float32"`, `"int8"`, ...).

mod dtype;
mod error;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::HostTensor;
