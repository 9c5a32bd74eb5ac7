// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The graph program a compiled model is executed from.
//!
//! - [`GraphJson`] — the on-disk JSON description: nodes, arg nodes, heads
//!   and per-entry `storage_id` / `shape` / `dltype` attributes.
//! - [`GraphNode`], [`NodeEntry`], [`OpAttrs`] — nodes and the entries that
//!   wire them together.
//! - [`ProgramGraph`] — the graph with a **type-state pattern**
//!   (`Loaded` → `Validated`). Only a validated graph exposes the entry
//!   layout and the [`StoragePlan`] a runtime allocates from.
//!
//! # Example
//! ```
//! use graph_ir::ProgramGraph;
//!
//! let json = r#"{
//!   "nodes": [{"op": "null", "name": "x", "inputs": []}],
//!   "arg_nodes": [0],
//!   "heads": [[0, 0, 0]],
//!   "attrs": {
//!     "storage_id": ["list_int", [0]],
//!     "shape": ["list_shape", [[2, 2]]],
//!     "dltype": ["list_str", ["int32"]]
//!   }
//! }"#;
//! let graph = ProgramGraph::from_json("identity", json).unwrap().validate().unwrap();
//! assert_eq!(graph.storage_plan().total_bytes(), 16);
//! println!("{}", graph.summary());
//! ```

mod error;
pub mod graph;
mod graph_json;
mod node;

pub use error::GraphError;
pub use graph::{EntryInfo, ProgramGraph, StoragePlan, StorageSlot};
pub use graph_json::{GraphAttrs, GraphJson, TaggedList};
pub use node::{GraphNode, NodeEntry, OpAttrs, OpKind};
