// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # section-alloc
//!
//! Device-address bookkeeping for snps_ev sessions.
//!
//! # Key Components
//!
//! - [`DevPtr`] — a typed device address, never interchangeable with a host
//!   pointer.
//! - [`SectionKind`] — which device section an allocation comes from
//!   (`Heap` for long-lived tensors, `Workspace` for operator scratch).
//! - [`SectionAllocator`] — a best-fit free-list allocator over one fixed
//!   device address range, with word-size padding, coalescing on free, and
//!   detection of invalid or double frees.
//! - [`ByteSize`] — human-readable section sizes for layout configuration
//!   (`"64K"`, `"1M"`).
//! - [`AllocationStats`] — cumulative per-section counters.
//!
//! The allocator only tracks addresses; it never reads or writes device
//! memory. That is the session's job.
//!
//! # Example
//! ```
//! use section_alloc::{DevPtr, SectionAllocator, SectionKind};
//!
//! let mut ws = SectionAllocator::new(SectionKind::Workspace, DevPtr::new(0x1000), 256, 8).unwrap();
//! let scratch = ws.allocate(32, 4).unwrap();
//! assert!(ws.contains(scratch));
//! ws.free(scratch).unwrap();
//! assert!(ws.free(scratch).is_err()); // double free is reported
//! ```

mod allocator;
mod dev_ptr;
mod error;
mod section;
mod size;
mod stats;

pub use allocator::SectionAllocator;
pub use dev_ptr::DevPtr;
pub use error::AllocError;
pub use section::SectionKind;
pub use size::ByteSize;
pub use stats::AllocationStats;
