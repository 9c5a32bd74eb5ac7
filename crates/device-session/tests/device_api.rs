// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: sessions, section accounting and copies through the
//! snps_ev device API against the simulated device.

use std::sync::Arc;

use device_session::{
    registry, CopySource, CopyTarget, DeviceApi, DeviceContext, DeviceError, DeviceHandle,
    HostLowLevelDevice, Session, SessionConfig, SnpsEvDeviceApi,
};
use section_alloc::{AllocError, SectionKind};

const EV: DeviceContext = DeviceContext::snps_ev(0);
const CPU: DeviceContext = DeviceContext::cpu();

// ── Helpers ────────────────────────────────────────────────────

fn open_session() -> (Arc<Session>, Arc<HostLowLevelDevice>) {
    let config = SessionConfig::default();
    let device = Arc::new(HostLowLevelDevice::covering(&config));
    let session = Session::open(&config, device.clone()).unwrap();
    (session, device)
}

fn api() -> &'static dyn DeviceApi {
    registry::lookup(SnpsEvDeviceApi::NAME).unwrap()
}

fn write_host(handle: &DeviceHandle, bytes: &[u8]) {
    api()
        .copy_data_from_to(
            CopySource::host(bytes),
            CopyTarget::device(handle, 0),
            bytes.len(),
            CPU,
            EV,
        )
        .unwrap();
}

fn read_host(handle: &DeviceHandle, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    api()
        .copy_data_from_to(
            CopySource::device(handle, 0),
            CopyTarget::host(&mut out),
            len,
            EV,
            CPU,
        )
        .unwrap();
    out
}

// ── Allocation accounting ──────────────────────────────────────

#[test]
fn test_allocations_in_bounds_and_padded() {
    let (session, _) = open_session();
    let (start, end) = session.section_range(SectionKind::Heap);
    let api = SnpsEvDeviceApi::global();

    let mut handles = Vec::new();
    for size in [1usize, 7, 8, 9, 63, 64, 100, 1000] {
        let before = session.free_bytes(SectionKind::Heap);
        let h = api.alloc_data_space_in(&session, size, 4).unwrap();
        assert!(h.dev_ptr() >= start && h.dev_ptr() < end);
        let padded = size.div_ceil(8) * 8;
        assert_eq!(before - session.free_bytes(SectionKind::Heap), padded);
        handles.push(h);
    }

    // No two live allocations overlap.
    let mut spans: Vec<_> = handles
        .iter()
        .map(|h| (h.dev_ptr().value(), h.dev_ptr().value() + h.size() as u64))
        .collect();
    spans.sort();
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0);
    }

    for h in handles {
        api.free_data_space(EV, h).unwrap();
    }
    assert_eq!(session.allocated_bytes(SectionKind::Heap), 0);
}

#[test]
fn test_alloc_free_restores_free_space() {
    let (session, _) = open_session();
    let api = SnpsEvDeviceApi::global();
    let keep = api.alloc_data_space_in(&session, 40, 8).unwrap();

    for section in SectionKind::ALL {
        let before = session.free_bytes(section);
        let h = match section {
            SectionKind::Heap => api.alloc_data_space_in(&session, 123, 1).unwrap(),
            SectionKind::Workspace => api.alloc_workspace_in(&session, 123).unwrap(),
        };
        assert!(session.free_bytes(section) < before);
        match section {
            SectionKind::Heap => api.free_data_space(EV, h).unwrap(),
            SectionKind::Workspace => api.free_workspace(EV, h).unwrap(),
        }
        assert_eq!(session.free_bytes(section), before);
    }
    api.free_data_space(EV, keep).unwrap();
}

#[test]
fn test_zero_sized_allocation_rejected() {
    let (session, _) = open_session();
    let err = SnpsEvDeviceApi::global()
        .alloc_data_space_in(&session, 0, 8)
        .unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Allocation(AllocError::ZeroSizedAllocation(SectionKind::Heap))
    ));
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_pattern_roundtrip_and_reuse() {
    let (session, _) = open_session();
    let _scope = Session::enter(&session);
    let api = api();

    let h = api.alloc_data_space(EV, 64, 8).unwrap();
    write_host(&h, &[0xAB; 64]);
    assert_eq!(read_host(&h, 64), vec![0xAB; 64]);

    let first = h.dev_ptr();
    api.free_data_space(EV, h).unwrap();
    assert_eq!(session.allocated_bytes(SectionKind::Heap), 0);

    let again = api.alloc_data_space(EV, 64, 8).unwrap();
    assert_eq!(again.dev_ptr(), first);
    api.free_data_space(EV, again).unwrap();
}

#[test]
fn test_cross_session_copy_rejected_before_transport() {
    let (s1, d1) = open_session();
    let (s2, d2) = open_session();
    let api = SnpsEvDeviceApi::global();
    let a = api.alloc_data_space_in(&s1, 64, 8).unwrap();
    let b = api.alloc_data_space_in(&s2, 64, 8).unwrap();

    for (size, from_off, to_off) in [(64, 0, 0), (0, 0, 0), (8, 56, 0), (1_000_000, 3, 9)] {
        let err = api
            .copy_data_from_to(
                CopySource::device(&a, from_off),
                CopyTarget::device(&b, to_off),
                size,
                EV,
                EV,
            )
            .unwrap_err();
        match err {
            DeviceError::SessionMismatch { from, to } => {
                assert_eq!(from, s1.id());
                assert_eq!(to, s2.id());
            }
            other => panic!("expected SessionMismatch, got {other}"),
        }
    }

    assert_eq!(d1.read_count() + d1.write_count(), 0);
    assert_eq!(d2.read_count() + d2.write_count(), 0);
    api.free_data_space(EV, a).unwrap();
    api.free_data_space(EV, b).unwrap();
}

#[test]
fn test_workspace_exhaustion_leaves_heap_untouched() {
    let (session, _) = open_session();
    let _scope = Session::enter(&session);
    let api = api();

    let heap_before = session.free_bytes(SectionKind::Heap);
    let ws_capacity = session.free_bytes(SectionKind::Workspace);

    let err = api.alloc_workspace(EV, ws_capacity + 8).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Allocation(AllocError::OutOfSpace {
            section: SectionKind::Workspace,
            ..
        })
    ));
    assert_eq!(session.free_bytes(SectionKind::Heap), heap_before);
    assert_eq!(session.free_bytes(SectionKind::Workspace), ws_capacity);
    assert_eq!(session.section_stats(SectionKind::Workspace).failed_allocations, 1);
}

#[test]
fn test_device_host_device_roundtrip() {
    let (session, _) = open_session();
    let api = SnpsEvDeviceApi::global();
    let original: Vec<u8> = (0..=255u8).cycle().take(300).collect();

    let src = api.alloc_data_space_in(&session, original.len(), 8).unwrap();
    write_host(&src, &original);

    let staged = read_host(&src, original.len());
    let fresh = api.alloc_data_space_in(&session, original.len(), 8).unwrap();
    write_host(&fresh, &staged);

    assert_ne!(src.dev_ptr(), fresh.dev_ptr());
    assert_eq!(read_host(&fresh, original.len()), original);
    api.free_data_space(EV, src).unwrap();
    api.free_data_space(EV, fresh).unwrap();
}

#[test]
fn test_stream_sync_is_pure() {
    let (session, device) = open_session();
    let api = SnpsEvDeviceApi::global();
    let h = api.alloc_data_space_in(&session, 32, 8).unwrap();

    let heap = session.section_stats(SectionKind::Heap);
    let free = session.free_bytes(SectionKind::Heap);
    for _ in 0..100 {
        api.stream_sync(EV);
    }
    assert_eq!(session.section_stats(SectionKind::Heap), heap);
    assert_eq!(session.free_bytes(SectionKind::Heap), free);
    assert_eq!(device.read_count() + device.write_count(), 0);
    api.free_data_space(EV, h).unwrap();
}

#[test]
fn test_double_free_detected() {
    let (session, _) = open_session();
    let api = SnpsEvDeviceApi::global();
    let h = api.alloc_data_space_in(&session, 16, 8).unwrap();
    let ptr = h.dev_ptr();
    api.free_data_space(EV, h).unwrap();

    // The handle is gone; a stale raw pointer is still caught.
    let err = session.free_in_section(SectionKind::Heap, ptr).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Allocation(AllocError::InvalidFree { .. })
    ));
    assert_eq!(session.section_stats(SectionKind::Heap).invalid_frees, 1);
}

#[test]
fn test_handle_keeps_session_alive() {
    let (session, _) = open_session();
    let weak = Arc::downgrade(&session);
    let h = SnpsEvDeviceApi::global()
        .alloc_workspace_in(&session, 16)
        .unwrap();
    drop(session);

    assert!(weak.upgrade().is_some());
    SnpsEvDeviceApi::global().free_workspace(EV, h).unwrap();
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_copy_out_of_device_bounds() {
    let (session, device) = open_session();
    let api = SnpsEvDeviceApi::global();
    let a = api.alloc_data_space_in(&session, 16, 8).unwrap();
    let b = api.alloc_data_space_in(&session, 16, 8).unwrap();

    let err = api
        .copy_data_from_to(CopySource::device(&a, 8), CopyTarget::device(&b, 0), 16, EV, EV)
        .unwrap_err();
    assert!(matches!(
        err,
        DeviceError::CopyOutOfBounds { side: "source", .. }
    ));
    assert_eq!(device.read_count(), 0);
    api.free_data_space(EV, a).unwrap();
    api.free_data_space(EV, b).unwrap();
}

#[test]
fn test_rejected_free_keeps_range_releasable() {
    let (session, _) = open_session();
    let api = api();
    let scratch = SnpsEvDeviceApi::global().alloc_workspace_in(&session, 64).unwrap();
    let buf = SnpsEvDeviceApi::global().alloc_data_space_in(&session, 64, 8).unwrap();

    // Workspace handle through the Heap call, Heap handle under a cpu context.
    let err = api.free_data_space(EV, scratch).unwrap_err();
    assert!(matches!(err.error(), DeviceError::WrongSection { .. }));
    let scratch = err.into_handle();
    let err = api.free_data_space(CPU, buf).unwrap_err();
    assert!(matches!(err.error(), DeviceError::UnsupportedContext(_)));
    let buf = err.into_handle();

    assert_eq!(session.allocated_bytes(SectionKind::Workspace), 64);
    assert_eq!(session.allocated_bytes(SectionKind::Heap), 64);

    api.free_workspace(EV, scratch).unwrap();
    api.free_data_space(EV, buf).unwrap();
    assert_eq!(session.allocated_bytes(SectionKind::Workspace), 0);
    assert_eq!(session.allocated_bytes(SectionKind::Heap), 0);
    assert_eq!(session.section_stats(SectionKind::Heap).invalid_frees, 0);
}
