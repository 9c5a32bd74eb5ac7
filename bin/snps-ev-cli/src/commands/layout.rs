// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `snps-ev layout` command: print and validate the section layout.

use std::path::PathBuf;

use anyhow::Context;
use section_alloc::SectionKind;

use super::read_session_config;

pub fn execute(config: Option<PathBuf>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             snps-ev · Section Layout                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let layout = read_session_config(config.as_deref())?;
    match &config {
        Some(path) => println!("  Source:     {}", path.display()),
        None => println!("  Source:     built-in default"),
    }
    println!("  Device id:  {}", layout.device_id);
    println!("  Word size:  {} B", layout.word_size);
    println!();

    println!(
        "  {:<10} {:>12} {:>12} {:>10}",
        "Section", "Start", "End", "Size",
    );
    println!("  {}", "-".repeat(48));
    for kind in SectionKind::ALL {
        let section = layout.section(kind);
        let end = section
            .end()
            .map(|end| format!("{end:#010x}"))
            .unwrap_or_else(|| "overflow".to_string());
        println!(
            "  {:<10} {:>12} {:>12} {:>10}",
            kind.as_str(),
            section.start.to_string(),
            end,
            section.size.to_string(),
        );
    }
    println!();

    layout.validate().context("invalid section layout")?;
    let (base, span) = layout.address_span();
    println!("  Layout OK: {span} B addressed from {base}");
    println!();
    Ok(())
}
