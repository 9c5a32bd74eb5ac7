// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `snps-ev inspect` command: display a graph program and its storage plan.
//!
//! Loads and validates the graph JSON, prints the node table and every
//! data entry, then checks whether the storage plan fits the configured
//! Heap section.

use std::path::PathBuf;

use graph_ir::ProgramGraph;
use section_alloc::SectionKind;

use super::{load_session_config, truncate};

pub fn execute(graph_path: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             snps-ev · Graph Inspector               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let session = load_session_config(config.as_deref())?;
    let graph = ProgramGraph::from_file(&graph_path)
        .and_then(|g| g.validate())
        .map_err(|e| {
            anyhow::anyhow!("failed to load graph from '{}': {e}", graph_path.display())
        })?;

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", graph.summary());
    println!();

    // ── Nodes ──────────────────────────────────────────────────
    println!(
        "  {:<4} {:<24} {:<8} {:<24} {:>6} {:>7}",
        "Nid", "Name", "Op", "Function", "Inputs", "Outputs",
    );
    println!("  {}", "-".repeat(78));
    for (nid, node) in graph.nodes().iter().enumerate() {
        println!(
            "  {:<4} {:<24} {:<8} {:<24} {:>6} {:>7}",
            nid,
            truncate(&node.name, 24),
            node.op.as_str(),
            truncate(node.func_name().unwrap_or("-"), 24),
            node.inputs.len(),
            node.num_outputs(),
        );
    }
    println!();

    // ── Entries ────────────────────────────────────────────────
    println!(
        "  {:<4} {:<18} {:<8} {:>8} {:>10}",
        "Eid", "Shape", "DType", "Storage", "Bytes",
    );
    println!("  {}", "-".repeat(52));
    for (eid, entry) in graph.entries().iter().enumerate() {
        println!(
            "  {:<4} {:<18} {:<8} {:>8} {:>10}",
            eid,
            truncate(&entry.shape.to_string(), 18),
            entry.dtype.as_str(),
            entry.storage_id,
            entry.size_bytes(),
        );
    }
    println!();

    // ── Storage Plan ───────────────────────────────────────────
    let plan = graph.storage_plan();
    println!("  Storage plan ({} buffers):", plan.slots.len());
    for slot in &plan.slots {
        println!(
            "   sid {:<4} {:>10} B  shared by {} entr{}",
            slot.storage_id,
            slot.size_bytes,
            slot.entries,
            if slot.entries == 1 { "y" } else { "ies" },
        );
    }
    println!();

    let word = session.word_size;
    let needed = plan.padded_bytes(word);
    let heap = session.section(SectionKind::Heap).size.as_bytes();
    println!("  Heap fit ({word}-byte words):");
    println!("   Required:   {needed} B");
    println!("   Heap size:  {heap} B");
    if needed <= heap {
        println!("   Fits, {} B to spare", heap - needed);
    } else {
        println!("   DOES NOT FIT, short by {} B", needed - heap);
    }
    println!();
    Ok(())
}
