// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device API contract and its snps_ev implementation.
//!
//! A graph runtime talks to every device family through [`DeviceApi`]:
//! allocate, free, copy, synchronise. [`SnpsEvDeviceApi`] serves those calls
//! from a [`Session`], either the calling thread's current one or one passed
//! explicitly through the `*_in` methods.
//!
//! # Copy directions
//!
//! | from \ to | snps_ev | cpu |
//! |---|---|---|
//! | snps_ev | read into staging, write back | one read |
//! | cpu | one write | rejected |
//!
//! Copy endpoints are tagged ([`CopySource`], [`CopyTarget`]) so a host
//! slice can never be mistaken for a device address.

use std::sync::Arc;

use section_alloc::SectionKind;
use tracing::{debug, warn};

use crate::{
    DeviceAttr, DeviceContext, DeviceError, DeviceHandle, DeviceKind, FreeError, Session,
};

/// Where a copy reads from.
#[derive(Debug, Clone, Copy)]
pub enum CopySource<'a> {
    Device {
        handle: &'a DeviceHandle,
        offset: usize,
    },
    Host {
        data: &'a [u8],
        offset: usize,
    },
}

impl<'a> CopySource<'a> {
    pub fn device(handle: &'a DeviceHandle, offset: usize) -> Self {
        CopySource::Device { handle, offset }
    }

    pub fn host(data: &'a [u8]) -> Self {
        CopySource::Host { data, offset: 0 }
    }
}

/// Where a copy writes to.
#[derive(Debug)]
pub enum CopyTarget<'a> {
    Device {
        handle: &'a DeviceHandle,
        offset: usize,
    },
    Host {
        data: &'a mut [u8],
        offset: usize,
    },
}

impl<'a> CopyTarget<'a> {
    pub fn device(handle: &'a DeviceHandle, offset: usize) -> Self {
        CopyTarget::Device { handle, offset }
    }

    pub fn host(data: &'a mut [u8]) -> Self {
        CopyTarget::Host { data, offset: 0 }
    }
}

/// Uniform memory contract a runtime uses for one device family.
pub trait DeviceApi: Send + Sync {
    /// Name the API is registered under.
    fn name(&self) -> &'static str;

    /// Selects the device for subsequent calls.
    fn set_device(&self, ctx: DeviceContext) -> Result<(), DeviceError>;

    /// Queries a device attribute; `None` when the device does not report it.
    fn get_attr(&self, ctx: DeviceContext, attr: DeviceAttr) -> Option<i64>;

    /// Allocates a long-lived data buffer.
    fn alloc_data_space(
        &self,
        ctx: DeviceContext,
        size: usize,
        alignment: usize,
    ) -> Result<DeviceHandle, DeviceError>;

    /// Releases a buffer from [`DeviceApi::alloc_data_space`]. A refused
    /// free hands the buffer back inside the error.
    fn free_data_space(&self, ctx: DeviceContext, handle: DeviceHandle) -> Result<(), FreeError>;

    /// Allocates operator scratch space.
    fn alloc_workspace(&self, ctx: DeviceContext, size: usize) -> Result<DeviceHandle, DeviceError>;

    /// Releases scratch space from [`DeviceApi::alloc_workspace`].
    fn free_workspace(&self, ctx: DeviceContext, handle: DeviceHandle) -> Result<(), FreeError>;

    /// Copies `size` bytes between two endpoints.
    fn copy_data_from_to(
        &self,
        from: CopySource<'_>,
        to: CopyTarget<'_>,
        size: usize,
        ctx_from: DeviceContext,
        ctx_to: DeviceContext,
    ) -> Result<(), DeviceError>;

    /// Waits for outstanding work on `ctx`.
    fn stream_sync(&self, ctx: DeviceContext);
}

/// [`DeviceApi`] for snps_ev devices.
///
/// Stateless: all state lives in sessions. Use [`SnpsEvDeviceApi::global`]
/// or [`crate::registry::lookup`] to get the shared instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnpsEvDeviceApi;

static GLOBAL: SnpsEvDeviceApi = SnpsEvDeviceApi;

impl SnpsEvDeviceApi {
    pub const NAME: &'static str = "device_api.snps_ev";
    /// Name host-side dispatch uses for the same API.
    pub const DEV_NAME: &'static str = "device_api.snps_ev_dev";

    /// The process-wide instance.
    pub fn global() -> &'static SnpsEvDeviceApi {
        &GLOBAL
    }

    /// Allocates from `session`'s Heap.
    pub fn alloc_data_space_in(
        &self,
        session: &Arc<Session>,
        size: usize,
        alignment: usize,
    ) -> Result<DeviceHandle, DeviceError> {
        Self::alloc_in(session, SectionKind::Heap, size, alignment)
    }

    /// Allocates word-aligned scratch from `session`'s Workspace.
    pub fn alloc_workspace_in(
        &self,
        session: &Arc<Session>,
        size: usize,
    ) -> Result<DeviceHandle, DeviceError> {
        Self::alloc_in(session, SectionKind::Workspace, size, session.word_size())
    }

    fn alloc_in(
        session: &Arc<Session>,
        kind: SectionKind,
        size: usize,
        alignment: usize,
    ) -> Result<DeviceHandle, DeviceError> {
        let ptr = session.allocate_in_section(kind, size, alignment)?;
        Ok(DeviceHandle::new(ptr, kind, size, Arc::clone(session)))
    }

    /// Releases `handle` from `expected`. Nothing is freed unless every
    /// check passes; on any error the handle is returned untouched.
    fn free(
        ctx: DeviceContext,
        handle: DeviceHandle,
        expected: SectionKind,
    ) -> Result<(), FreeError> {
        if let Err(error) = Self::ensure_device(ctx) {
            return Err(FreeError::new(error, handle));
        }
        if handle.section() != expected {
            let error = DeviceError::WrongSection {
                addr: handle.dev_ptr(),
                expected,
                actual: handle.section(),
            };
            return Err(FreeError::new(error, handle));
        }
        let freed = handle.session().free_in_section(expected, handle.dev_ptr());
        freed.map_err(|error| FreeError::new(error, handle))
    }

    fn ensure_device(ctx: DeviceContext) -> Result<(), DeviceError> {
        match ctx.kind {
            DeviceKind::SnpsEv => Ok(()),
            DeviceKind::Cpu => Err(DeviceError::UnsupportedContext(ctx)),
        }
    }

    fn copy_device_to_device(
        from: CopySource<'_>,
        to: CopyTarget<'_>,
        size: usize,
        ctx_from: DeviceContext,
        ctx_to: DeviceContext,
    ) -> Result<(), DeviceError> {
        let (src, src_offset) = device_source(from)?;
        let (dst, dst_offset) = device_target(to)?;
        if !src.same_session(dst) {
            return Err(DeviceError::SessionMismatch {
                from: src.session().id(),
                to: dst.session().id(),
            });
        }
        if ctx_from.device_id != ctx_to.device_id {
            return Err(DeviceError::DeviceIdMismatch {
                from: ctx_from.device_id,
                to: ctx_to.device_id,
            });
        }
        let from_addr = src.span("source", src_offset, size)?;
        let to_addr = dst.span("destination", dst_offset, size)?;

        let device = src.session().low_level_device();
        let mut staging = vec![0u8; size];
        device.read(from_addr, &mut staging)?;
        device.write(to_addr, &staging)?;
        debug!("copy {size} bytes {from_addr} -> {to_addr} on '{}'", device.name());
        Ok(())
    }

    fn copy_device_to_host(
        from: CopySource<'_>,
        to: CopyTarget<'_>,
        size: usize,
    ) -> Result<(), DeviceError> {
        let (src, src_offset) = device_source(from)?;
        let (data, dst_offset) = host_target(to)?;
        let from_addr = src.span("source", src_offset, size)?;
        let dst = host_span_mut(data, "destination", dst_offset, size)?;

        src.session().low_level_device().read(from_addr, dst)?;
        debug!("copy {size} bytes {from_addr} -> host");
        Ok(())
    }

    fn copy_host_to_device(
        from: CopySource<'_>,
        to: CopyTarget<'_>,
        size: usize,
    ) -> Result<(), DeviceError> {
        let (data, src_offset) = host_source(from)?;
        let (dst, dst_offset) = device_target(to)?;
        let src = host_span(data, "source", src_offset, size)?;
        let to_addr = dst.span("destination", dst_offset, size)?;

        dst.session().low_level_device().write(to_addr, src)?;
        debug!("copy {size} bytes host -> {to_addr}");
        Ok(())
    }
}

impl DeviceApi for SnpsEvDeviceApi {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set_device(&self, ctx: DeviceContext) -> Result<(), DeviceError> {
        if ctx.kind != DeviceKind::SnpsEv {
            warn!("set_device called with non-snps_ev context {ctx}");
            return Err(DeviceError::UnsupportedContext(ctx));
        }
        Ok(())
    }

    fn get_attr(&self, _ctx: DeviceContext, attr: DeviceAttr) -> Option<i64> {
        match attr {
            DeviceAttr::Exist => Some(1),
            _ => None,
        }
    }

    fn alloc_data_space(
        &self,
        ctx: DeviceContext,
        size: usize,
        alignment: usize,
    ) -> Result<DeviceHandle, DeviceError> {
        Self::ensure_device(ctx)?;
        self.alloc_data_space_in(&Session::current()?, size, alignment)
    }

    fn free_data_space(&self, ctx: DeviceContext, handle: DeviceHandle) -> Result<(), FreeError> {
        Self::free(ctx, handle, SectionKind::Heap)
    }

    fn alloc_workspace(&self, ctx: DeviceContext, size: usize) -> Result<DeviceHandle, DeviceError> {
        Self::ensure_device(ctx)?;
        self.alloc_workspace_in(&Session::current()?, size)
    }

    fn free_workspace(&self, ctx: DeviceContext, handle: DeviceHandle) -> Result<(), FreeError> {
        Self::free(ctx, handle, SectionKind::Workspace)
    }

    fn copy_data_from_to(
        &self,
        from: CopySource<'_>,
        to: CopyTarget<'_>,
        size: usize,
        ctx_from: DeviceContext,
        ctx_to: DeviceContext,
    ) -> Result<(), DeviceError> {
        match (ctx_from.kind, ctx_to.kind) {
            (DeviceKind::SnpsEv, DeviceKind::SnpsEv) => {
                Self::copy_device_to_device(from, to, size, ctx_from, ctx_to)
            }
            (DeviceKind::SnpsEv, DeviceKind::Cpu) => Self::copy_device_to_host(from, to, size),
            (DeviceKind::Cpu, DeviceKind::SnpsEv) => Self::copy_host_to_device(from, to, size),
            (from, to) => Err(DeviceError::UnsupportedCopyDirection { from, to }),
        }
    }

    fn stream_sync(&self, _ctx: DeviceContext) {}
}

// ── Endpoint unpacking ──────────────────────────────────────────

fn device_source<'a>(from: CopySource<'a>) -> Result<(&'a DeviceHandle, usize), DeviceError> {
    match from {
        CopySource::Device { handle, offset } => Ok((handle, offset)),
        CopySource::Host { .. } => Err(DeviceError::EndpointMismatch {
            side: "source",
            context: DeviceKind::SnpsEv,
        }),
    }
}

fn device_target<'a>(to: CopyTarget<'a>) -> Result<(&'a DeviceHandle, usize), DeviceError> {
    match to {
        CopyTarget::Device { handle, offset } => Ok((handle, offset)),
        CopyTarget::Host { .. } => Err(DeviceError::EndpointMismatch {
            side: "destination",
            context: DeviceKind::SnpsEv,
        }),
    }
}

fn host_source<'a>(from: CopySource<'a>) -> Result<(&'a [u8], usize), DeviceError> {
    match from {
        CopySource::Host { data, offset } => Ok((data, offset)),
        CopySource::Device { .. } => Err(DeviceError::EndpointMismatch {
            side: "source",
            context: DeviceKind::Cpu,
        }),
    }
}

fn host_target<'a>(to: CopyTarget<'a>) -> Result<(&'a mut [u8], usize), DeviceError> {
    match to {
        CopyTarget::Host { data, offset } => Ok((data, offset)),
        CopyTarget::Device { .. } => Err(DeviceError::EndpointMismatch {
            side: "destination",
            context: DeviceKind::Cpu,
        }),
    }
}

fn host_span<'a>(
    data: &'a [u8],
    side: &'static str,
    offset: usize,
    size: usize,
) -> Result<&'a [u8], DeviceError> {
    match offset.checked_add(size) {
        Some(end) if end <= data.len() => Ok(&data[offset..end]),
        _ => Err(DeviceError::CopyOutOfBounds {
            side,
            offset,
            size,
            len: data.len(),
        }),
    }
}

fn host_span_mut<'a>(
    data: &'a mut [u8],
    side: &'static str,
    offset: usize,
    size: usize,
) -> Result<&'a mut [u8], DeviceError> {
    let len = data.len();
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(&mut data[offset..end]),
        _ => Err(DeviceError::CopyOutOfBounds {
            side,
            offset,
            size,
            len,
        }),
    }
}
