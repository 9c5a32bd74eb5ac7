// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes and the entries that connect them.
//!
//! Every node produces one or more *entries* (output tensors). Inputs refer
//! to an entry by `(node id, output index, version)`, written in JSON as a
//! two- or three-element array.

use std::fmt;

use serde::{Deserialize, Deserializer};

/// A reference to one output of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<usize>", into = "[usize; 3]")]
pub struct NodeEntry {
    pub node_id: usize,
    pub index: usize,
    pub version: usize,
}

impl NodeEntry {
    pub fn new(node_id: usize, index: usize) -> Self {
        Self {
            node_id,
            index,
            version: 0,
        }
    }
}

impl TryFrom<Vec<usize>> for NodeEntry {
    type Error = String;

    fn try_from(v: Vec<usize>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [node_id, index] => Ok(Self::new(*node_id, *index)),
            [node_id, index, version] => Ok(Self {
                node_id: *node_id,
                index: *index,
                version: *version,
            }),
            other => Err(format!(
                "node entry must have 2 or 3 elements, got {}",
                other.len()
            )),
        }
    }
}

impl From<NodeEntry> for [usize; 3] {
    fn from(e: NodeEntry) -> Self {
        [e.node_id, e.index, e.version]
    }
}

impl fmt::Display for NodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.index)
    }
}

/// What a node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// A graph input or parameter; produces one entry and computes nothing.
    Null,
    /// A call into the operator module.
    TvmOp,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::TvmOp => "tvm_op",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of an operator node.
///
/// Graph compilers write the numeric fields as strings (`"1"`); both
/// strings and plain numbers are accepted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OpAttrs {
    /// Operator module function this node calls.
    #[serde(default)]
    pub func_name: String,
    #[serde(default, deserialize_with = "lenient_usize")]
    pub num_inputs: usize,
    #[serde(default = "default_outputs", deserialize_with = "lenient_usize")]
    pub num_outputs: usize,
    /// Whether the operator wants its arguments as flat 1-D buffers.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub flatten_data: bool,
}

fn default_outputs() -> usize {
    1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Num(u64),
    Bool(bool),
    Str(String),
}

fn lenient_usize<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    match Lenient::deserialize(d)? {
        Lenient::Num(n) => usize::try_from(n).map_err(serde::de::Error::custom),
        Lenient::Bool(b) => Ok(usize::from(b)),
        Lenient::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got '{s}'"))),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    lenient_usize(d).map(|n| n != 0)
}

/// One node of the graph program.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphNode {
    pub op: OpKind,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<NodeEntry>,
    #[serde(default, alias = "attr", skip_serializing_if = "Option::is_none")]
    pub attrs: Option<OpAttrs>,
}

impl GraphNode {
    /// A graph input.
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            op: OpKind::Null,
            name: name.into(),
            inputs: Vec::new(),
            attrs: None,
        }
    }

    /// A single-output operator calling `func_name`.
    pub fn op(name: impl Into<String>, func_name: impl Into<String>, inputs: Vec<NodeEntry>) -> Self {
        Self {
            op: OpKind::TvmOp,
            name: name.into(),
            attrs: Some(OpAttrs {
                func_name: func_name.into(),
                num_inputs: inputs.len(),
                num_outputs: 1,
                flatten_data: false,
            }),
            inputs,
        }
    }

    /// Number of entries the node produces.
    pub fn num_outputs(&self) -> usize {
        match (self.op, &self.attrs) {
            (OpKind::TvmOp, Some(attrs)) => attrs.num_outputs,
            _ => 1,
        }
    }

    /// The operator function, for `tvm_op` nodes that name one.
    pub fn func_name(&self) -> Option<&str> {
        match (self.op, &self.attrs) {
            (OpKind::TvmOp, Some(attrs)) if !attrs.func_name.is_empty() => {
                Some(attrs.func_name.as_str())
            }
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match self.func_name() {
            Some(func) => format!(
                "{} [{}] {}({})",
                self.name,
                self.op,
                func,
                self.inputs
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => format!("{} [{}]", self.name, self.op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_two_or_three_elements() {
        let e: NodeEntry = serde_json::from_str("[3, 1]").unwrap();
        assert_eq!(e, NodeEntry::new(3, 1));
        let e: NodeEntry = serde_json::from_str("[3, 1, 2]").unwrap();
        assert_eq!(e.version, 2);
        assert!(serde_json::from_str::<NodeEntry>("[3]").is_err());
    }

    #[test]
    fn test_entry_serializes_as_triple() {
        let json = serde_json::to_string(&NodeEntry::new(4, 0)).unwrap();
        assert_eq!(json, "[4,0,0]");
    }

    #[test]
    fn test_string_attrs() {
        let json = r#"{
            "op": "tvm_op",
            "name": "fused_add",
            "attrs": {"func_name": "fused_add", "num_inputs": "2", "num_outputs": "1", "flatten_data": "0"},
            "inputs": [[0, 0, 0], [1, 0, 0]]
        }"#;
        let node: GraphNode = serde_json::from_str(json).unwrap();
        let attrs = node.attrs.as_ref().unwrap();
        assert_eq!(attrs.num_inputs, 2);
        assert!(!attrs.flatten_data);
        assert_eq!(node.func_name(), Some("fused_add"));
    }

    #[test]
    fn test_numeric_attrs_and_defaults() {
        let json = r#"{"op": "tvm_op", "name": "n", "attrs": {"func_name": "f", "flatten_data": 1}}"#;
        let node: GraphNode = serde_json::from_str(json).unwrap();
        let attrs = node.attrs.unwrap();
        assert_eq!(attrs.num_outputs, 1);
        assert!(attrs.flatten_data);
    }

    #[test]
    fn test_bad_attr_string() {
        let json = r#"{"op": "tvm_op", "name": "n", "attrs": {"num_inputs": "two"}}"#;
        assert!(serde_json::from_str::<GraphNode>(json).is_err());
    }

    #[test]
    fn test_null_node_outputs() {
        let node = GraphNode::input("x");
        assert_eq!(node.num_outputs(), 1);
        assert_eq!(node.func_name(), None);
        assert_eq!(node.summary(), "x [null]");
    }

    #[test]
    fn test_op_summary() {
        let node = GraphNode::op("add", "add_one", vec![NodeEntry::new(0, 0)]);
        assert_eq!(node.summary(), "add [tvm_op] add_one(0:0)");
    }

    #[test]
    fn test_unknown_op_rejected() {
        let json = r#"{"op": "conv", "name": "n"}"#;
        assert!(serde_json::from_str::<GraphNode>(json).is_err());
    }
}
