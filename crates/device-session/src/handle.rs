// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::Arc;

use section_alloc::{DevPtr, SectionKind};

use crate::{DeviceError, Session};

/// An allocation on an snps_ev device, tagged with the session that owns it.
///
/// Handles are created by the device API's alloc calls and consumed by the
/// matching free, so each one is released at most once. A refused free
/// returns the handle inside its [`crate::FreeError`]. A handle that is
/// dropped without being freed leaks its range until the session closes.
#[must_use = "device memory stays reserved until the handle is freed"]
pub struct DeviceHandle {
    ptr: DevPtr,
    section: SectionKind,
    size: usize,
    session: Arc<Session>,
}

impl DeviceHandle {
    pub(crate) fn new(ptr: DevPtr, section: SectionKind, size: usize, session: Arc<Session>) -> Self {
        Self {
            ptr,
            section,
            size,
            session,
        }
    }

    pub fn dev_ptr(&self) -> DevPtr {
        self.ptr
    }

    pub fn section(&self) -> SectionKind {
        self.section
    }

    /// Requested size in bytes (before word padding).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether both handles were allocated from the same session.
    pub fn same_session(&self, other: &DeviceHandle) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Device address of `offset`, after checking that `len` bytes from
    /// there stay inside the allocation.
    pub(crate) fn span(
        &self,
        side: &'static str,
        offset: usize,
        len: usize,
    ) -> Result<DevPtr, DeviceError> {
        let out_of_bounds = || DeviceError::CopyOutOfBounds {
            side,
            offset,
            size: len,
            len: self.size,
        };
        match offset.checked_add(len) {
            Some(end) if end <= self.size => self.ptr.offset(offset).ok_or_else(out_of_bounds),
            _ => Err(out_of_bounds()),
        }
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("ptr", &self.ptr)
            .field("section", &self.section)
            .field("size", &self.size)
            .field("session", &self.session.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostLowLevelDevice, SessionConfig};

    fn handle(size: usize) -> DeviceHandle {
        let config = SessionConfig::default();
        let session =
            Session::open(&config, Arc::new(HostLowLevelDevice::covering(&config))).unwrap();
        DeviceHandle::new(DevPtr::new(0x2000_0040), SectionKind::Heap, size, session)
    }

    #[test]
    fn test_span_in_bounds() {
        let h = handle(32);
        assert_eq!(h.span("source", 0, 32).unwrap(), DevPtr::new(0x2000_0040));
        assert_eq!(h.span("source", 8, 8).unwrap(), DevPtr::new(0x2000_0048));
        assert_eq!(h.span("source", 32, 0).unwrap(), DevPtr::new(0x2000_0060));
    }

    #[test]
    fn test_span_out_of_bounds() {
        let h = handle(32);
        let err = h.span("destination", 16, 17).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::CopyOutOfBounds {
                side: "destination",
                offset: 16,
                size: 17,
                len: 32
            }
        ));
        assert!(h.span("source", usize::MAX, 1).is_err());
    }

    #[test]
    fn test_same_session() {
        let a = handle(8);
        let b = DeviceHandle::new(
            DevPtr::new(0x2000_0000),
            SectionKind::Heap,
            8,
            Arc::clone(a.session()),
        );
        let c = handle(8);
        assert!(a.same_session(&b));
        assert!(!a.same_session(&c));
    }
}
