// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph program file format.
//!
//! # Format
//! ```json
//! {
//!   "nodes": [
//!     {"op": "null", "name": "x", "inputs": []},
//!     {"op": "tvm_op", "name": "add", "inputs": [[0, 0, 0]],
//!      "attrs": {"func_name": "add_one", "num_inputs": "1", "num_outputs": "1", "flatten_data": "0"}}
//!   ],
//!   "arg_nodes": [0],
//!   "heads": [[1, 0, 0]],
//!   "node_row_ptr": [0, 1, 2],
//!   "attrs": {
//!     "storage_id": ["list_int", [0, 1]],
//!     "shape": ["list_shape", [[1, 4], [1, 4]]],
//!     "dltype": ["list_str", ["float32", "float32"]]
//!   }
//! }
//! ```
//!
//! `attrs` arrays have one element per entry, in entry order. An entry's id
//! is `node_row_ptr[node] + output index`. `node_row_ptr` may be omitted, in
//! which case it is derived from each node's output count.

use std::path::Path;

use crate::{GraphError, GraphNode, NodeEntry};

/// A list attribute tagged with its element kind, written as
/// `["list_int", [...]]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaggedList<T>(pub String, pub Vec<T>);

impl<T> TaggedList<T> {
    pub fn new(tag: &str, items: Vec<T>) -> Self {
        Self(tag.to_string(), items)
    }

    pub fn tag(&self) -> &str {
        &self.0
    }

    pub fn items(&self) -> &[T] {
        &self.1
    }
}

/// Per-entry attributes of the graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphAttrs {
    /// Storage slot each entry lives in. Entries with the same id share
    /// one device buffer.
    pub storage_id: TaggedList<i64>,
    /// Shape of each entry.
    pub shape: TaggedList<Vec<i64>>,
    /// DLPack dtype string of each entry (`"float32"`, `"int8"`, ...).
    pub dltype: TaggedList<String>,
}

/// A graph program as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphJson {
    pub nodes: Vec<GraphNode>,
    /// Node ids of the graph inputs, in input-index order.
    #[serde(default)]
    pub arg_nodes: Vec<usize>,
    /// Graph outputs, in output-index order.
    #[serde(default)]
    pub heads: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_row_ptr: Option<Vec<usize>>,
    pub attrs: GraphAttrs,
}

impl GraphJson {
    /// Loads a graph from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialises the graph to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
