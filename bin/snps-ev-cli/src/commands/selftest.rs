// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `snps-ev selftest` command: exercise a session on the simulated device.
//!
//! Opens a session over an in-process [`HostLowLevelDevice`], then walks
//! the allocate, host→device, device→device, device→host and free paths of
//! the registered device API, checking the data and the section accounting
//! at each step.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ensure, Context};
use device_session::{
    registry, CopySource, CopyTarget, DeviceApi, DeviceContext, HostLowLevelDevice,
    LowLevelDevice, Session, SnpsEvDeviceApi,
};
use section_alloc::SectionKind;
use tracing::info;

use super::load_session_config;

const BLOCK: usize = 64;
const PATTERN: u8 = 0xAB;

pub fn execute(config: Option<PathBuf>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              snps-ev · Device Selftest              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let config = load_session_config(config.as_deref())?;
    let device = Arc::new(HostLowLevelDevice::covering(&config));
    let session = Session::open(&config, device.clone())?;
    let _scope = Session::enter(&session);

    let api = registry::lookup(SnpsEvDeviceApi::NAME)
        .with_context(|| format!("device API '{}' is not registered", SnpsEvDeviceApi::NAME))?;
    let dev = DeviceContext::snps_ev(config.device_id);
    let cpu = DeviceContext::cpu();
    let heap_free = session.free_bytes(SectionKind::Heap);
    let word = session.word_size();

    println!("  Session:    {} on {}", session.id(), device.name());
    println!("  Device API: {}", api.name());
    println!();

    // ── Allocate ───────────────────────────────────────────────
    api.set_device(dev)?;
    let src = api.alloc_data_space(dev, BLOCK, word)?;
    let dst = api.alloc_data_space(dev, BLOCK, word)?;
    println!("  [1] allocated {BLOCK} B at {} and {}", src.dev_ptr(), dst.dev_ptr());

    // ── Host → device ──────────────────────────────────────────
    let pattern = vec![PATTERN; BLOCK];
    api.copy_data_from_to(
        CopySource::host(&pattern),
        CopyTarget::device(&src, 0),
        BLOCK,
        cpu,
        dev,
    )?;
    println!("  [2] wrote {BLOCK} x {PATTERN:#04x} host -> {}", src.dev_ptr());

    // ── Device → device ────────────────────────────────────────
    api.copy_data_from_to(
        CopySource::device(&src, 0),
        CopyTarget::device(&dst, 0),
        BLOCK,
        dev,
        dev,
    )?;
    println!("  [3] copied {} -> {}", src.dev_ptr(), dst.dev_ptr());

    // ── Device → host ──────────────────────────────────────────
    let mut readback = vec![0u8; BLOCK];
    api.copy_data_from_to(
        CopySource::device(&dst, 0),
        CopyTarget::host(&mut readback),
        BLOCK,
        dev,
        cpu,
    )?;
    ensure!(readback == pattern, "read back from {} does not match", dst.dev_ptr());
    println!("  [4] read back {} -> host, pattern intact", dst.dev_ptr());

    // ── Workspace scratch ──────────────────────────────────────
    let scratch = api.alloc_workspace(dev, BLOCK / 2)?;
    println!("  [5] workspace scratch at {}", scratch.dev_ptr());
    api.free_workspace(dev, scratch)?;

    // ── Free and reuse ─────────────────────────────────────────
    let first = src.dev_ptr();
    api.free_data_space(dev, src)?;
    api.free_data_space(dev, dst)?;
    ensure!(
        session.free_bytes(SectionKind::Heap) == heap_free,
        "heap free bytes not restored after free"
    );
    let again = api.alloc_data_space(dev, BLOCK, word)?;
    ensure!(again.dev_ptr() == first, "freed block was not reused");
    println!("  [6] freed both blocks, {first} reused");
    api.free_data_space(dev, again)?;
    api.stream_sync(dev);
    println!();

    // ── Statistics ─────────────────────────────────────────────
    for kind in SectionKind::ALL {
        let (start, end) = session.section_range(kind);
        println!("  {kind} [{start}, {end}):");
        println!("   {}", session.section_stats(kind).summary());
    }
    println!(
        "  Transport: {} reads, {} writes",
        device.read_count(),
        device.write_count(),
    );
    println!();
    info!("selftest passed on {}", session.id());
    println!("  Selftest passed.");
    Ok(())
}
