// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-section allocation statistics.
//!
//! [`AllocationStats`] tracks cumulative counters for one section: how many
//! requests succeeded or failed, how many frees were rejected, and the
//! high-water mark. They are the first thing to look at when sizing a
//! section in the layout config.

/// Cumulative statistics about one section's allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocation requests.
    pub total_allocations: u64,
    /// Allocation requests rejected for lack of contiguous space.
    pub failed_allocations: u64,
    /// Successful frees.
    pub total_frees: u64,
    /// Frees rejected because the address was not live.
    pub invalid_frees: u64,
    /// Highest number of padded bytes live at once.
    pub peak_allocated_bytes: usize,
    /// Padded bytes ever handed out (including freed and reallocated).
    pub cumulative_allocated_bytes: u64,
}

impl AllocationStats {
    /// Returns the fraction of allocation requests that failed, in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` if no requests have been made.
    pub fn failure_ratio(&self) -> f64 {
        let total = self.total_allocations + self.failed_allocations;
        if total == 0 {
            return 0.0;
        }
        self.failed_allocations as f64 / total as f64
    }

    pub(crate) fn record_allocation(&mut self, padded_size: usize, live_bytes: usize) {
        self.total_allocations += 1;
        self.cumulative_allocated_bytes += padded_size as u64;
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(live_bytes);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_allocations += 1;
    }

    pub(crate) fn record_free(&mut self) {
        self.total_frees += 1;
    }

    pub(crate) fn record_invalid_free(&mut self) {
        self.invalid_frees += 1;
    }

    /// Returns a one-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} allocations ({} failed, {:.0}% failure rate), {} frees ({} invalid), \
             peak {} bytes, {} bytes cumulative",
            self.total_allocations,
            self.failed_allocations,
            self.failure_ratio() * 100.0,
            self.total_frees,
            self.invalid_frees,
            self.peak_allocated_bytes,
            self.cumulative_allocated_bytes,
        )
    }
}
