// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph loading and validation.

/// Errors that can occur when reading or validating a graph program.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph file could not be read.
    #[error("failed to read graph: {0}")]
    ReadError(#[from] std::io::Error),

    /// The graph JSON is malformed.
    #[error("failed to parse graph: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The graph as a whole is malformed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A node is malformed or references something it cannot.
    #[error("invalid node {node} ('{name}'): {detail}")]
    InvalidNode {
        node: usize,
        name: String,
        detail: String,
    },

    /// A graph-level attribute array is malformed.
    #[error("invalid graph attribute '{attr}': {detail}")]
    InvalidAttr { attr: &'static str, detail: String },

    /// An entry names a dtype the runtime does not know.
    #[error("entry {entry}: unknown dtype '{dtype}'")]
    UnknownDType { entry: usize, dtype: String },
}
