// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph execution profiling.
//!
//! [`RunMetrics`] collects per-operator timing plus the device memory the
//! run used. Per-operator entries are only recorded when profiling is
//! enabled; the totals are always filled in.

use std::time::Duration;

/// Timing for a single operator call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpMetrics {
    /// Node name.
    pub node: String,
    /// Module function the node called.
    pub func: String,
    pub duration: Duration,
}

/// Aggregate metrics for one [`crate::GraphRuntime::run`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunMetrics {
    /// Wall-clock time of the whole run.
    pub total_duration: Duration,
    /// Number of operator calls made.
    pub ops_executed: usize,
    /// Per-operator timing (empty when profiling is off).
    pub op_metrics: Vec<OpMetrics>,
    /// Heap bytes held by the runtime's storage buffers.
    pub heap_allocated_bytes: usize,
    /// Highest Workspace usage seen by the session so far.
    pub workspace_peak_bytes: usize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one operator call.
    pub fn record_op(&mut self, node: &str, func: &str, duration: Duration) {
        self.op_metrics.push(OpMetrics {
            node: node.to_string(),
            func: func.to_string(),
            duration,
        });
    }

    /// Fills in the run-level totals.
    pub fn finalise(&mut self, total: Duration, ops: usize, heap_bytes: usize, workspace_peak: usize) {
        self.total_duration = total;
        self.ops_executed = ops;
        self.heap_allocated_bytes = heap_bytes;
        self.workspace_peak_bytes = workspace_peak;
    }

    /// Sum of the recorded operator durations.
    pub fn total_op_duration(&self) -> Duration {
        self.op_metrics.iter().map(|m| m.duration).sum()
    }

    /// The operator that took longest, if any were recorded.
    pub fn slowest_op(&self) -> Option<&OpMetrics> {
        self.op_metrics.iter().max_by_key(|m| m.duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Run: {:.3}ms total, {} ops, {:.3}ms in operators, heap {} B, workspace peak {} B",
            self.total_duration.as_secs_f64() * 1000.0,
            self.ops_executed,
            self.total_op_duration().as_secs_f64() * 1000.0,
            self.heap_allocated_bytes,
            self.workspace_peak_bytes,
        );
        if let Some(slowest) = self.slowest_op() {
            s.push_str(&format!(
                ", slowest '{}' ({:.3}ms)",
                slowest.node,
                slowest.duration.as_secs_f64() * 1000.0
            ));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = RunMetrics::new();
        assert_eq!(m.total_op_duration(), Duration::ZERO);
        assert!(m.slowest_op().is_none());
    }

    #[test]
    fn test_record_and_finalise() {
        let mut m = RunMetrics::new();
        m.record_op("add", "fused_add", Duration::from_millis(2));
        m.record_op("mul", "fused_mul", Duration::from_millis(5));
        m.finalise(Duration::from_millis(9), 2, 96, 16);

        assert_eq!(m.ops_executed, 2);
        assert_eq!(m.total_op_duration(), Duration::from_millis(7));
        assert_eq!(m.slowest_op().unwrap().node, "mul");
        assert_eq!(m.heap_allocated_bytes, 96);
    }

    #[test]
    fn test_summary_format() {
        let mut m = RunMetrics::new();
        m.record_op("add", "fused_add", Duration::from_millis(1));
        m.finalise(Duration::from_millis(3), 1, 64, 0);

        let s = m.summary();
        assert!(s.contains("Run:"));
        assert!(s.contains("1 ops"));
        assert!(s.contains("heap 64 B"));
        assert!(s.contains("slowest 'add'"));
    }
}
