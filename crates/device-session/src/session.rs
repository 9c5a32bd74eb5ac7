// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A device session: one attached low-level device plus the section
//! allocators that carve up its memory.
//!
//! Sessions are shared through `Arc`. Every [`crate::DeviceHandle`] holds a
//! clone, so a session outlives all memory allocated from it. Dropping the
//! last reference detaches the device.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use section_alloc::{AllocationStats, DevPtr, SectionAllocator, SectionKind};
use tracing::{info, warn};

use crate::{DeviceError, LowLevelDevice, SessionConfig};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

struct Sections {
    heap: SectionAllocator,
    workspace: SectionAllocator,
}

impl Sections {
    fn get(&self, kind: SectionKind) -> &SectionAllocator {
        match kind {
            SectionKind::Heap => &self.heap,
            SectionKind::Workspace => &self.workspace,
        }
    }

    fn get_mut(&mut self, kind: SectionKind) -> &mut SectionAllocator {
        match kind {
            SectionKind::Heap => &mut self.heap,
            SectionKind::Workspace => &mut self.workspace,
        }
    }
}

/// An open connection to one snps_ev device.
pub struct Session {
    id: SessionId,
    device_id: u32,
    word_size: usize,
    device: Arc<dyn LowLevelDevice>,
    sections: Mutex<Sections>,
}

impl Session {
    /// Validates `config`, builds both section allocators and attaches
    /// `device`.
    pub fn open(
        config: &SessionConfig,
        device: Arc<dyn LowLevelDevice>,
    ) -> Result<Arc<Self>, DeviceError> {
        config.validate()?;

        let build = |kind: SectionKind| {
            let section = config.section(kind);
            SectionAllocator::new(
                kind,
                section.start,
                section.size.as_bytes(),
                config.word_size,
            )
        };
        let sections = Sections {
            heap: build(SectionKind::Heap)?,
            workspace: build(SectionKind::Workspace)?,
        };

        let id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        info!(
            "{id} attached to '{}' (device {}, heap {} @ {}, workspace {} @ {})",
            device.name(),
            config.device_id,
            config.heap.size,
            config.heap.start,
            config.workspace.size,
            config.workspace.start,
        );

        Ok(Arc::new(Self {
            id,
            device_id: config.device_id,
            word_size: config.word_size,
            device,
            sections: Mutex::new(sections),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// The transport every copy on this session goes through.
    pub fn low_level_device(&self) -> &Arc<dyn LowLevelDevice> {
        &self.device
    }

    /// Reserves `size` bytes in the `kind` section.
    pub fn allocate_in_section(
        &self,
        kind: SectionKind,
        size: usize,
        alignment: usize,
    ) -> Result<DevPtr, DeviceError> {
        Ok(self.sections().get_mut(kind).allocate(size, alignment)?)
    }

    /// Releases a live allocation in the `kind` section.
    pub fn free_in_section(&self, kind: SectionKind, ptr: DevPtr) -> Result<(), DeviceError> {
        self.sections().get_mut(kind).free(ptr)?;
        Ok(())
    }

    pub fn free_bytes(&self, kind: SectionKind) -> usize {
        self.sections().get(kind).free_bytes()
    }

    pub fn allocated_bytes(&self, kind: SectionKind) -> usize {
        self.sections().get(kind).allocated_bytes()
    }

    pub fn live_allocations(&self, kind: SectionKind) -> usize {
        self.sections().get(kind).live_allocations()
    }

    /// Snapshot of the `kind` section's counters.
    pub fn section_stats(&self, kind: SectionKind) -> AllocationStats {
        self.sections().get(kind).stats()
    }

    /// `[start, end)` of the `kind` section.
    pub fn section_range(&self, kind: SectionKind) -> (DevPtr, DevPtr) {
        let sections = self.sections();
        let section = sections.get(kind);
        (section.start(), section.end())
    }

    fn sections(&self) -> MutexGuard<'_, Sections> {
        self.sections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let sections = self.sections();
        for kind in SectionKind::ALL {
            let live = sections.get(kind).live_allocations();
            if live > 0 {
                warn!("{}: detaching with {live} live {kind} allocations", self.id);
            }
        }
        drop(sections);
        info!("{} detached from '{}'", self.id, self.device.name());
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("device", &self.device.name())
            .field("heap_free", &self.free_bytes(SectionKind::Heap))
            .field("workspace_free", &self.free_bytes(SectionKind::Workspace))
            .finish()
    }
}
