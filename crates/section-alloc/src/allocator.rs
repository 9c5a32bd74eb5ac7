// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Free-list allocator over one fixed device address range.
//!
//! A [`SectionAllocator`] owns `[start, start + capacity)` of device memory
//! and hands out word-aligned blocks from it. It never touches the device:
//! it only does the bookkeeping, and the session issues the actual reads and
//! writes against the addresses it returns.
//!
//! # Strategy
//! - Every request is padded up to the section's word size, so every block
//!   boundary stays word-aligned and the free space shrinks by exactly the
//!   padded size.
//! - Best-fit over a free list sorted by offset.
//! - On free, the block is reinserted and merged with adjacent free blocks,
//!   so an allocate/free pair always restores the previous free space.
//! - Live allocations are tracked by offset; freeing anything else is
//!   reported as [`AllocError::InvalidFree`] instead of corrupting the list.

use crate::{AllocError, AllocationStats, DevPtr, SectionKind};
use std::collections::BTreeMap;

/// A free region, as an offset from the section start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeBlock {
    offset: usize,
    size: usize,
}

impl FreeBlock {
    fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    fn is_adjacent_to(&self, next: &FreeBlock) -> bool {
        self.offset + self.size == next.offset
    }
}

/// Allocator for a single device memory section.
///
/// # Example
/// ```
/// use section_alloc::{DevPtr, SectionAllocator, SectionKind};
///
/// let mut heap = SectionAllocator::new(SectionKind::Heap, DevPtr::new(0x2000_0000), 1024, 8).unwrap();
///
/// let a = heap.allocate(10, 8).unwrap();   // padded to 16 bytes
/// assert_eq!(heap.free_bytes(), 1024 - 16);
///
/// heap.free(a).unwrap();
/// assert_eq!(heap.free_bytes(), 1024);
/// ```
pub struct SectionAllocator {
    kind: SectionKind,
    start: DevPtr,
    capacity: usize,
    word_size: usize,
    /// Sorted by offset, never two adjacent entries.
    free_blocks: Vec<FreeBlock>,
    /// Offset → padded size of every live allocation.
    live: BTreeMap<usize, usize>,
    allocated: usize,
    stats: AllocationStats,
}

impl SectionAllocator {
    /// Creates an allocator over `capacity` bytes starting at `start`.
    ///
    /// `word_size` is the section's base alignment. It must be a power of
    /// two; `start` must be aligned to it and `capacity` must be a non-zero
    /// multiple of it.
    pub fn new(
        kind: SectionKind,
        start: DevPtr,
        capacity: usize,
        word_size: usize,
    ) -> Result<Self, AllocError> {
        let invalid = |detail: String| AllocError::InvalidLayout {
            section: kind,
            detail,
        };
        if !word_size.is_power_of_two() {
            return Err(invalid(format!("word size {word_size} is not a power of two")));
        }
        if !start.is_aligned(word_size) {
            return Err(invalid(format!(
                "start address {start} is not aligned to {word_size} bytes"
            )));
        }
        if capacity == 0 || capacity % word_size != 0 {
            return Err(invalid(format!(
                "capacity {capacity} is not a non-zero multiple of {word_size}"
            )));
        }
        if start.offset(capacity).is_none() {
            return Err(invalid(format!(
                "range {start} + {capacity} overflows the device address space"
            )));
        }

        Ok(Self {
            kind,
            start,
            capacity,
            word_size,
            free_blocks: vec![FreeBlock::new(0, capacity)],
            live: BTreeMap::new(),
            allocated: 0,
            stats: AllocationStats::default(),
        })
    }

    /// Reserves `size` contiguous bytes and returns their device address.
    ///
    /// `alignment` must evenly divide the section's word size; every block
    /// is word-aligned, so that is sufficient to honour it.
    ///
    /// # Errors
    /// - [`AllocError::ZeroSizedAllocation`] if `size == 0`.
    /// - [`AllocError::InvalidAlignment`] if `alignment` does not divide the
    ///   word size.
    /// - [`AllocError::OutOfSpace`] if no free block can hold the padded size.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Result<DevPtr, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSizedAllocation(self.kind));
        }
        if alignment == 0 || self.word_size % alignment != 0 {
            return Err(AllocError::InvalidAlignment {
                section: self.kind,
                alignment,
                word_size: self.word_size,
            });
        }

        let found = self
            .padded(size)
            .and_then(|padded| self.find_best_fit(padded).map(|idx| (idx, padded)));
        let Some((idx, padded)) = found else {
            self.stats.record_failure();
            tracing::warn!(
                "section '{}' exhausted: requested {} bytes, {} free (largest block {})",
                self.kind,
                size,
                self.free_bytes(),
                self.largest_free_block(),
            );
            return Err(AllocError::OutOfSpace {
                section: self.kind,
                requested: size,
                free_bytes: self.free_bytes(),
                largest_free: self.largest_free_block(),
            });
        };

        let block = self.free_blocks[idx];
        if block.size == padded {
            self.free_blocks.remove(idx);
        } else {
            self.free_blocks[idx] = FreeBlock::new(block.offset + padded, block.size - padded);
        }

        self.live.insert(block.offset, padded);
        self.allocated += padded;
        self.stats.record_allocation(padded, self.allocated);

        let ptr = self.ptr_at(block.offset);
        tracing::debug!(
            "section '{}': allocated {} bytes ({} padded) at {}",
            self.kind,
            size,
            padded,
            ptr,
        );
        Ok(ptr)
    }

    /// Releases a live allocation and returns its padded size.
    ///
    /// # Errors
    /// [`AllocError::InvalidFree`] if `ptr` is not the start of a live
    /// allocation in this section (never allocated, already freed, or
    /// belonging to another section).
    pub fn free(&mut self, ptr: DevPtr) -> Result<usize, AllocError> {
        let entry = ptr
            .distance_from(self.start)
            .and_then(|offset| self.live.remove(&offset).map(|size| (offset, size)));
        let Some((offset, size)) = entry else {
            self.stats.record_invalid_free();
            return Err(AllocError::InvalidFree {
                section: self.kind,
                addr: ptr,
            });
        };

        self.allocated -= size;
        self.stats.record_free();

        let pos = self.free_blocks.partition_point(|b| b.offset < offset);
        self.free_blocks.insert(pos, FreeBlock::new(offset, size));
        self.coalesce_around(pos);

        tracing::debug!("section '{}': freed {} bytes at {}", self.kind, size, ptr);
        Ok(size)
    }

    /// Returns which section this allocator manages.
    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// Returns the first address of the section.
    pub fn start(&self) -> DevPtr {
        self.start
    }

    /// Returns the address one past the end of the section.
    pub fn end(&self) -> DevPtr {
        self.ptr_at(self.capacity)
    }

    /// Returns the section size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the section's base alignment.
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// Returns the number of padded bytes currently live.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Returns the number of bytes not currently allocated.
    pub fn free_bytes(&self) -> usize {
        self.capacity - self.allocated
    }

    /// Returns the size of the largest contiguous free block.
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// Returns the number of disjoint free blocks.
    pub fn fragment_count(&self) -> usize {
        self.free_blocks.len()
    }

    /// Returns the number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if `ptr` lies inside this section's range.
    pub fn contains(&self, ptr: DevPtr) -> bool {
        ptr >= self.start && ptr < self.end()
    }

    /// Returns the padded size of the live allocation starting at `ptr`.
    pub fn allocation_size(&self, ptr: DevPtr) -> Option<usize> {
        ptr.distance_from(self.start)
            .and_then(|offset| self.live.get(&offset).copied())
    }

    /// Returns a snapshot of the allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.stats.clone()
    }

    fn ptr_at(&self, offset: usize) -> DevPtr {
        DevPtr::new(self.start.value() + offset as u64)
    }

    fn padded(&self, size: usize) -> Option<usize> {
        size.checked_add(self.word_size - 1)
            .map(|s| s & !(self.word_size - 1))
    }

    /// Smallest free block that can hold `size` bytes.
    fn find_best_fit(&self, size: usize) -> Option<usize> {
        self.free_blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.size >= size)
            .min_by_key(|(_, b)| b.size)
            .map(|(idx, _)| idx)
    }

    /// Merges the block at `pos` with its neighbours where they touch.
    fn coalesce_around(&mut self, pos: usize) {
        if pos + 1 < self.free_blocks.len()
            && self.free_blocks[pos].is_adjacent_to(&self.free_blocks[pos + 1])
        {
            self.free_blocks[pos].size += self.free_blocks[pos + 1].size;
            self.free_blocks.remove(pos + 1);
        }
        if pos > 0 && self.free_blocks[pos - 1].is_adjacent_to(&self.free_blocks[pos]) {
            self.free_blocks[pos - 1].size += self.free_blocks[pos].size;
            self.free_blocks.remove(pos);
        }
    }
}

impl std::fmt::Debug for SectionAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionAllocator")
            .field("kind", &self.kind)
            .field("start", &format_args!("{}", self.start))
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated)
            .field("live", &self.live.len())
            .field("fragments", &self.free_blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x2000_0000;

    fn heap(capacity: usize) -> SectionAllocator {
        SectionAllocator::new(SectionKind::Heap, DevPtr::new(BASE), capacity, 8).unwrap()
    }

    #[test]
    fn test_first_allocation_at_start() {
        let mut a = heap(1024);
        let p = a.allocate(64, 8).unwrap();
        assert_eq!(p, DevPtr::new(BASE));
        assert_eq!(a.allocated_bytes(), 64);
        assert_eq!(a.free_bytes(), 960);
    }

    #[test]
    fn test_padding_to_word_size() {
        let mut a = heap(1024);
        let p1 = a.allocate(3, 1).unwrap();
        let p2 = a.allocate(9, 4).unwrap();
        assert_eq!(a.allocation_size(p1), Some(8));
        assert_eq!(a.allocation_size(p2), Some(16));
        assert_eq!(a.free_bytes(), 1024 - 24);
        assert!(p1.is_aligned(8) && p2.is_aligned(8));
    }

    #[test]
    fn test_no_overlap() {
        let mut a = heap(1024);
        let mut ranges = Vec::new();
        for size in [8, 24, 100, 40, 7] {
            let p = a.allocate(size, 8).unwrap();
            let len = a.allocation_size(p).unwrap() as u64;
            ranges.push((p.value(), p.value() + len));
        }
        ranges.sort();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "overlapping ranges {:?}", w);
        }
    }

    #[test]
    fn test_zero_size() {
        let mut a = heap(1024);
        assert!(matches!(
            a.allocate(0, 8),
            Err(AllocError::ZeroSizedAllocation(SectionKind::Heap))
        ));
    }

    #[test]
    fn test_alignment_must_divide_word_size() {
        let mut a = heap(1024);
        assert!(a.allocate(8, 4).is_ok());
        assert!(matches!(
            a.allocate(8, 16),
            Err(AllocError::InvalidAlignment { alignment: 16, word_size: 8, .. })
        ));
        assert!(matches!(
            a.allocate(8, 3),
            Err(AllocError::InvalidAlignment { .. })
        ));
        assert!(a.allocate(8, 0).is_err());
    }

    #[test]
    fn test_out_of_space() {
        let mut a = heap(128);
        let _p = a.allocate(96, 8).unwrap();
        let err = a.allocate(64, 8).unwrap_err();
        assert!(matches!(
            err,
            AllocError::OutOfSpace { requested: 64, free_bytes: 32, largest_free: 32, .. }
        ));
        assert_eq!(a.stats().failed_allocations, 1);
        // Failure leaves the bookkeeping untouched.
        assert_eq!(a.free_bytes(), 32);
    }

    #[test]
    fn test_alloc_free_round_trip() {
        let mut a = heap(1024);
        let _keep = a.allocate(40, 8).unwrap();
        let before = a.free_bytes();
        let p = a.allocate(100, 8).unwrap();
        assert_eq!(a.free(p).unwrap(), 104);
        assert_eq!(a.free_bytes(), before);
        assert_eq!(a.fragment_count(), 1);
    }

    #[test]
    fn test_coalescing_restores_single_block() {
        let mut a = heap(1024);
        let p1 = a.allocate(64, 8).unwrap();
        let p2 = a.allocate(64, 8).unwrap();
        let p3 = a.allocate(64, 8).unwrap();
        a.free(p1).unwrap();
        a.free(p3).unwrap();
        assert_eq!(a.fragment_count(), 2);
        a.free(p2).unwrap();
        assert_eq!(a.fragment_count(), 1);
        assert_eq!(a.largest_free_block(), 1024);
    }

    #[test]
    fn test_best_fit_reuses_hole() {
        let mut a = heap(1024);
        let _p1 = a.allocate(64, 8).unwrap();
        let p2 = a.allocate(32, 8).unwrap();
        let _p3 = a.allocate(64, 8).unwrap();
        a.free(p2).unwrap();
        // The 32-byte hole is the tightest fit.
        assert_eq!(a.allocate(32, 8).unwrap(), p2);
    }

    #[test]
    fn test_double_free_detected() {
        let mut a = heap(1024);
        let p = a.allocate(16, 8).unwrap();
        a.free(p).unwrap();
        assert!(matches!(a.free(p), Err(AllocError::InvalidFree { .. })));
        assert_eq!(a.stats().invalid_frees, 1);
        assert_eq!(a.free_bytes(), 1024);
    }

    #[test]
    fn test_free_interior_or_foreign_address() {
        let mut a = heap(1024);
        let p = a.allocate(64, 8).unwrap();
        assert!(a.free(p.offset(8).unwrap()).is_err());
        assert!(a.free(DevPtr::new(BASE - 8)).is_err());
        assert!(a.free(DevPtr::new(0xdead_0000)).is_err());
        assert_eq!(a.live_allocations(), 1);
    }

    #[test]
    fn test_contains() {
        let a = heap(256);
        assert!(a.contains(DevPtr::new(BASE)));
        assert!(a.contains(DevPtr::new(BASE + 255)));
        assert!(!a.contains(a.end()));
        assert!(!a.contains(DevPtr::new(BASE - 1)));
    }

    #[test]
    fn test_invalid_layouts() {
        let s = SectionKind::Workspace;
        assert!(SectionAllocator::new(s, DevPtr::new(0), 1024, 6).is_err());
        assert!(SectionAllocator::new(s, DevPtr::new(4), 1024, 8).is_err());
        assert!(SectionAllocator::new(s, DevPtr::new(0), 0, 8).is_err());
        assert!(SectionAllocator::new(s, DevPtr::new(0), 1020, 8).is_err());
        assert!(SectionAllocator::new(s, DevPtr::new(u64::MAX - 7), 16, 8).is_err());
    }

    #[test]
    fn test_exhaust_and_refill() {
        let mut a = heap(256);
        let ptrs: Vec<_> = (0..4).map(|_| a.allocate(64, 8).unwrap()).collect();
        assert_eq!(a.free_bytes(), 0);
        assert!(a.allocate(1, 1).is_err());
        for p in ptrs {
            a.free(p).unwrap();
        }
        assert_eq!(a.allocate(256, 8).unwrap(), DevPtr::new(BASE));
    }

    #[test]
    fn test_stats_peak() {
        let mut a = heap(1024);
        let p1 = a.allocate(100, 8).unwrap();
        let p2 = a.allocate(200, 8).unwrap();
        a.free(p1).unwrap();
        a.free(p2).unwrap();
        let stats = a.stats();
        assert_eq!(stats.peak_allocated_bytes, 104 + 200);
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.total_frees, 2);
    }

    #[test]
    fn test_debug_format() {
        let a = heap(64);
        let debug = format!("{a:?}");
        assert!(debug.contains("SectionAllocator"));
        assert!(debug.contains("0x20000000"));
    }
}
