// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for host tensors.

use crate::DType;

/// Errors that can occur when building or reinterpreting a host tensor.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the size implied by shape and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Typed access was requested with the wrong element type.
    #[error("dtype mismatch: tensor holds {actual}, requested {requested}")]
    DTypeMismatch { actual: DType, requested: DType },
}
