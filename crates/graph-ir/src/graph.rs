// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Program graph: operator nodes wired together through entries.
//!
//! # Type-State Pattern
//!
//! ```text
//! ProgramGraph<Loaded>     — JSON parsed, not yet checked.
//!       │  .validate()
//!       ▼
//! ProgramGraph<Validated>  — wiring, attributes and dtypes verified;
//!                            entry layout resolved.
//! ```
//!
//! The graph runtime only accepts `ProgramGraph<Validated>`, so it never
//! sees a dangling input or an entry without a shape.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use host_tensor::{DType, Shape};

use crate::{GraphError, GraphJson, GraphNode, NodeEntry, OpKind, TaggedList};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been parsed but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and can be executed.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── Entries and storage ────────────────────────────────────────────

/// Resolved layout of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub shape: Shape,
    pub dtype: DType,
    pub storage_id: usize,
}

impl EntryInfo {
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }
}

/// One device buffer shared by every entry with the same storage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlot {
    pub storage_id: usize,
    /// Largest entry mapped to this slot.
    pub size_bytes: usize,
    /// Number of entries sharing the slot.
    pub entries: usize,
}

/// Buffers the runtime must allocate, ordered by storage id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoragePlan {
    pub slots: Vec<StorageSlot>,
}

impl StoragePlan {
    pub fn total_bytes(&self) -> usize {
        self.slots.iter().map(|s| s.size_bytes).sum()
    }

    /// Total after padding every slot to `word_size`.
    pub fn padded_bytes(&self, word_size: usize) -> usize {
        self.slots
            .iter()
            .map(|s| s.size_bytes.div_ceil(word_size) * word_size)
            .sum()
    }

    pub fn get(&self, storage_id: usize) -> Option<&StorageSlot> {
        self.slots.iter().find(|s| s.storage_id == storage_id)
    }
}

// ── ProgramGraph ───────────────────────────────────────────────────

/// A graph program. `S` encodes the validation state at compile time.
#[derive(Debug, Clone)]
pub struct ProgramGraph<S: GraphState = Loaded> {
    /// Human-readable name (file stem when loaded from disk).
    pub name: String,
    json: GraphJson,
    row_ptr: Vec<usize>,
    entries: Vec<EntryInfo>,
    _state: PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl ProgramGraph<Loaded> {
    pub fn new(name: impl Into<String>, json: GraphJson) -> Self {
        Self {
            name: name.into(),
            json,
            row_ptr: Vec::new(),
            entries: Vec::new(),
            _state: PhantomData,
        }
    }

    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, GraphError> {
        Ok(Self::new(name, GraphJson::from_json(json)?))
    }

    /// Loads a graph file; the graph is named after the file stem.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "graph".to_string());
        Ok(Self::new(name, GraphJson::from_file(path)?))
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph is non-empty.
    /// - `node_row_ptr`, when given, agrees with each node's output count.
    /// - Every input references an output of an earlier node.
    /// - Operator nodes name a function and declare their input count
    ///   correctly.
    /// - Arg nodes are `null` nodes; heads are in range.
    /// - Attribute arrays carry the right tag and one element per entry.
    /// - Dtypes are known, storage ids and dims non-negative, and no entry
    ///   is empty.
    pub fn validate(self) -> Result<ProgramGraph<Validated>, GraphError> {
        let nodes = &self.json.nodes;
        if nodes.is_empty() {
            return Err(GraphError::InvalidGraph("graph contains no nodes".into()));
        }

        let row_ptr = self.resolve_row_ptr()?;
        let num_entries = row_ptr[nodes.len()];
        let outputs_of = |nid: usize| row_ptr[nid + 1] - row_ptr[nid];

        for (nid, node) in nodes.iter().enumerate() {
            let invalid = |detail: String| GraphError::InvalidNode {
                node: nid,
                name: node.name.clone(),
                detail,
            };

            for input in &node.inputs {
                if input.node_id >= nid {
                    return Err(invalid(format!(
                        "input {input} does not reference an earlier node"
                    )));
                }
                if input.index >= outputs_of(input.node_id) {
                    return Err(invalid(format!(
                        "input {input} exceeds the {} outputs of node {}",
                        outputs_of(input.node_id),
                        input.node_id
                    )));
                }
            }

            match node.op {
                OpKind::TvmOp => {
                    let attrs = node
                        .attrs
                        .as_ref()
                        .ok_or_else(|| invalid("operator node has no attrs".into()))?;
                    if attrs.func_name.is_empty() {
                        return Err(invalid("operator node has no func_name".into()));
                    }
                    if attrs.num_inputs != node.inputs.len() {
                        return Err(invalid(format!(
                            "declares {} inputs but lists {}",
                            attrs.num_inputs,
                            node.inputs.len()
                        )));
                    }
                }
                OpKind::Null => {
                    if !node.inputs.is_empty() {
                        return Err(invalid("null node cannot have inputs".into()));
                    }
                }
            }
        }

        for &arg in &self.json.arg_nodes {
            match nodes.get(arg) {
                Some(node) if node.op == OpKind::Null => {}
                Some(node) => {
                    return Err(GraphError::InvalidNode {
                        node: arg,
                        name: node.name.clone(),
                        detail: format!("listed as an arg node but is a {} node", node.op),
                    })
                }
                None => {
                    return Err(GraphError::InvalidGraph(format!(
                        "arg node {arg} is out of range"
                    )))
                }
            }
        }

        for head in &self.json.heads {
            if head.node_id >= nodes.len() || head.index >= outputs_of(head.node_id) {
                return Err(GraphError::InvalidGraph(format!(
                    "head {head} is out of range"
                )));
            }
        }

        let entries = self.resolve_entries(num_entries)?;

        tracing::debug!(
            "validated graph '{}': {} nodes, {} entries",
            self.name,
            nodes.len(),
            num_entries
        );

        Ok(ProgramGraph {
            name: self.name,
            json: self.json,
            row_ptr,
            entries,
            _state: PhantomData,
        })
    }

    fn resolve_row_ptr(&self) -> Result<Vec<usize>, GraphError> {
        let mut derived = Vec::with_capacity(self.json.nodes.len() + 1);
        derived.push(0);
        for node in &self.json.nodes {
            let last = derived[derived.len() - 1];
            derived.push(last + node.num_outputs());
        }

        if let Some(given) = &self.json.node_row_ptr {
            if *given != derived {
                return Err(GraphError::InvalidGraph(format!(
                    "node_row_ptr {given:?} does not match node output counts {derived:?}"
                )));
            }
        }
        Ok(derived)
    }

    fn resolve_entries(&self, num_entries: usize) -> Result<Vec<EntryInfo>, GraphError> {
        let attrs = &self.json.attrs;
        check_list("storage_id", &attrs.storage_id, "list_int", num_entries)?;
        check_list("shape", &attrs.shape, "list_shape", num_entries)?;
        check_list("dltype", &attrs.dltype, "list_str", num_entries)?;

        let mut entries = Vec::with_capacity(num_entries);
        let mut total_bytes = 0usize;
        for eid in 0..num_entries {
            let raw_sid = attrs.storage_id.items()[eid];
            let storage_id = usize::try_from(raw_sid).map_err(|_| GraphError::InvalidAttr {
                attr: "storage_id",
                detail: format!("entry {eid} has negative storage id {raw_sid}"),
            })?;

            let dims = &attrs.shape.items()[eid];
            let shape = Shape::from_signed(dims).ok_or_else(|| GraphError::InvalidAttr {
                attr: "shape",
                detail: format!("entry {eid} has a negative dimension in {dims:?}"),
            })?;

            let name = &attrs.dltype.items()[eid];
            let dtype = DType::parse(name).ok_or_else(|| GraphError::UnknownDType {
                entry: eid,
                dtype: name.clone(),
            })?;

            let size = shape
                .checked_size_bytes(dtype)
                .ok_or_else(|| GraphError::InvalidAttr {
                    attr: "shape",
                    detail: format!("entry {eid} of shape {shape} {dtype} overflows the address space"),
                })?;
            if size == 0 {
                return Err(GraphError::InvalidAttr {
                    attr: "shape",
                    detail: format!("entry {eid} has zero elements"),
                });
            }
            total_bytes = total_bytes
                .checked_add(size)
                .ok_or_else(|| GraphError::InvalidAttr {
                    attr: "shape",
                    detail: format!("entries up to {eid} overflow the address space"),
                })?;

            entries.push(EntryInfo {
                shape,
                dtype,
                storage_id,
            });
        }
        Ok(entries)
    }
}

fn check_list<T>(
    attr: &'static str,
    list: &TaggedList<T>,
    expected_tag: &str,
    num_entries: usize,
) -> Result<(), GraphError> {
    let (tag, len) = (list.tag(), list.items().len());
    if tag != expected_tag {
        return Err(GraphError::InvalidAttr {
            attr,
            detail: format!("expected tag '{expected_tag}', got '{tag}'"),
        });
    }
    if len != num_entries {
        return Err(GraphError::InvalidAttr {
            attr,
            detail: format!("has {len} elements for {num_entries} entries"),
        });
    }
    Ok(())
}

// ── Validated state ────────────────────────────────────────────────

impl ProgramGraph<Validated> {
    pub fn num_nodes(&self) -> usize {
        self.json.nodes.len()
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn node(&self, nid: usize) -> Option<&GraphNode> {
        self.json.nodes.get(nid)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.json.nodes
    }

    /// Entry id of output `index` of node `nid`.
    pub fn entry_id(&self, nid: usize, index: usize) -> Option<usize> {
        let start = *self.row_ptr.get(nid)?;
        let end = *self.row_ptr.get(nid + 1)?;
        (start + index < end).then_some(start + index)
    }

    /// Entry id a [`NodeEntry`] refers to.
    pub fn entry_of(&self, entry: NodeEntry) -> Option<usize> {
        self.entry_id(entry.node_id, entry.index)
    }

    /// Every entry's layout, indexed by entry id.
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    pub fn entry(&self, eid: usize) -> Option<&EntryInfo> {
        self.entries.get(eid)
    }

    pub fn entry_shape(&self, eid: usize) -> Option<&Shape> {
        self.entries.get(eid).map(|e| &e.shape)
    }

    pub fn entry_dtype(&self, eid: usize) -> Option<DType> {
        self.entries.get(eid).map(|e| e.dtype)
    }

    /// Node ids of the graph inputs, in input-index order.
    pub fn input_nodes(&self) -> &[usize] {
        &self.json.arg_nodes
    }

    /// Input index of the arg node called `name`.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.json
            .arg_nodes
            .iter()
            .position(|&nid| self.json.nodes[nid].name == name)
    }

    /// Graph outputs, in output-index order.
    pub fn outputs(&self) -> &[NodeEntry] {
        &self.json.heads
    }

    /// Operator nodes in execution order, with their node ids.
    pub fn op_nodes(&self) -> impl Iterator<Item = (usize, &GraphNode)> {
        self.json
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.op == OpKind::TvmOp)
    }

    /// One slot per storage id, sized for the largest entry mapped to it.
    pub fn storage_plan(&self) -> StoragePlan {
        let mut slots: BTreeMap<usize, StorageSlot> = BTreeMap::new();
        for entry in &self.entries {
            let slot = slots.entry(entry.storage_id).or_insert(StorageSlot {
                storage_id: entry.storage_id,
                size_bytes: 0,
                entries: 0,
            });
            slot.size_bytes = slot.size_bytes.max(entry.size_bytes());
            slot.entries += 1;
        }
        StoragePlan {
            slots: slots.into_values().collect(),
        }
    }

    pub fn summary(&self) -> String {
        let plan = self.storage_plan();
        format!(
            "Graph '{}': {} nodes ({} ops), {} inputs, {} outputs, {} entries in {} buffers ({:.1} KB)",
            self.name,
            self.num_nodes(),
            self.op_nodes().count(),
            self.input_nodes().len(),
            self.outputs().len(),
            self.num_entries(),
            plan.slots.len(),
            plan.total_bytes() as f64 / 1024.0,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> ProgramGraph<S> {
    /// The graph as parsed.
    pub fn json(&self) -> &GraphJson {
        &self.json
    }
}

impl<S: GraphState> fmt::Display for ProgramGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ProgramGraph '{}' ({} nodes):", self.name, self.json.nodes.len())?;
        for (nid, node) in self.json.nodes.iter().enumerate() {
            writeln!(f, "  {nid:>3}  {}", node.summary())?;
        }
        Ok(())
    }
}
