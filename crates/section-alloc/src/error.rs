// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for section allocation.

use crate::{DevPtr, SectionKind};

/// Errors raised by a [`crate::SectionAllocator`] or by size parsing.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// No free block in the section is large enough for the request.
    #[error(
        "unable to allocate {requested} bytes in section \"{section}\": \
         {free_bytes} bytes free, largest free block {largest_free} bytes"
    )]
    OutOfSpace {
        section: SectionKind,
        requested: usize,
        free_bytes: usize,
        largest_free: usize,
    },

    /// Attempted to allocate a zero-sized block.
    #[error("cannot allocate zero-sized block in section \"{0}\"")]
    ZeroSizedAllocation(SectionKind),

    /// The requested alignment does not evenly divide the section's word size.
    #[error("alignment {alignment} is incompatible with section \"{section}\" (word size {word_size})")]
    InvalidAlignment {
        section: SectionKind,
        alignment: usize,
        word_size: usize,
    },

    /// The freed address is not a live allocation in this section.
    #[error("freed address {addr} was never allocated in section \"{section}\" (or was already freed)")]
    InvalidFree { section: SectionKind, addr: DevPtr },

    /// The section's address range or word size is unusable.
    #[error("invalid layout for section \"{section}\": {detail}")]
    InvalidLayout {
        section: SectionKind,
        detail: String,
    },

    /// A human-readable size string could not be parsed.
    #[error("invalid size '{input}': {detail}")]
    InvalidSize { input: String, detail: String },
}
