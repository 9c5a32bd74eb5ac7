// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-runtime
//!
//! A thin executor that sequences a compiled graph program over an snps_ev
//! device session.
//!
//! The runtime takes:
//! - A validated [`graph_ir::ProgramGraph`].
//! - An [`OperatorModule`] providing the operator functions the graph
//!   calls.
//! - A [`device_session::Session`] whose Heap holds the graph's buffers.
//!
//! It allocates one buffer per storage id, copies inputs in, calls each
//! operator in order, and copies outputs back out. Operator bodies receive
//! an [`OpEnv`] so they can move data and take Workspace scratch through
//! the same device API.

mod config;
mod error;
mod graph_runtime;
mod metrics;
mod module;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use graph_runtime::GraphRuntime;
pub use metrics::{OpMetrics, RunMetrics};
pub use module::{FunctionModule, ModuleError, OpArg, OpEnv, OpFn, OperatorModule};
