// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the graph runtime.

use host_tensor::{DType, Shape};

use crate::ModuleError;

/// Errors that can occur while creating or running a graph runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The graph program failed to load or validate.
    #[error("graph error: {0}")]
    GraphError(#[from] graph_ir::GraphError),

    /// A device call failed.
    #[error("device error: {0}")]
    DeviceError(#[from] device_session::DeviceError),

    /// The graph calls a function the module does not provide.
    #[error("module '{module}' has no function '{func}' (needed by node '{node}')")]
    MissingFunction {
        module: String,
        node: String,
        func: String,
    },

    /// An operator function failed.
    #[error("operator '{node}' failed: {source}")]
    OpFailed {
        node: String,
        #[source]
        source: ModuleError,
    },

    #[error("input index {index} out of range ({count} inputs)")]
    InputOutOfRange { index: usize, count: usize },

    #[error("graph has no input named '{0}'")]
    UnknownInput(String),

    #[error("output index {index} out of range ({count} outputs)")]
    OutputOutOfRange { index: usize, count: usize },

    /// A host tensor does not match the entry it is bound to.
    #[error("entry {entry} is {expected_shape} {expected_dtype}, got {actual_shape} {actual_dtype}")]
    TensorMismatch {
        entry: usize,
        expected_shape: Shape,
        expected_dtype: DType,
        actual_shape: Shape,
        actual_dtype: DType,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
