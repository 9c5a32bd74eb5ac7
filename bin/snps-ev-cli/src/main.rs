// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # snps-ev
//!
//! Command-line tooling for snps_ev device sessions and graph programs.
//!
//! ## Usage
//! ```bash
//! # Inspect a graph program and check it against the Heap layout
//! snps-ev inspect --graph ./graphs/add_scale.json --config ./configs/session.toml
//!
//! # Print and validate the section layout
//! snps-ev layout --config ./configs/session.toml
//!
//! # Exercise the allocator and copy paths on the simulated device
//! snps-ev -vv selftest
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "snps-ev",
    about = "Device sessions, section allocation and graph execution for snps_ev targets",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a graph program: node table, entries and storage plan.
    Inspect {
        /// Path to the graph JSON file.
        #[arg(short, long)]
        graph: PathBuf,

        /// Session layout to check the storage plan against.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print and validate the device section layout.
    Layout {
        /// Session layout TOML (defaults to the built-in layout).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the allocate / copy / free scenario on a simulated device.
    Selftest {
        /// Session layout TOML (defaults to the built-in layout).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Inspect { graph, config } => commands::inspect::execute(graph, config),
        Commands::Layout { config } => commands::layout::execute(config),
        Commands::Selftest { config } => commands::selftest::execute(config),
    }
}
