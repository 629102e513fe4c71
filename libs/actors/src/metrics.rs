//! Pool Metrics
//!
//! Lock-free counters shared by a [`ThreadPool`](crate::pool::ThreadPool) and
//! every [`RemoteHandle`](crate::handle::RemoteHandle) spawned through it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime counters for remote spawns and calls
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Spawn events routed to each context, indexed by pool position
    routed: RwLock<Vec<AtomicU64>>,
    pub spawns_succeeded: AtomicU64,
    pub spawns_failed: AtomicU64,
    pub calls_issued: AtomicU64,
    pub calls_failed: AtomicU64,
    pub orphan_responses: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for contexts up to `len`
    pub(crate) fn track_contexts(&self, len: usize) {
        let mut routed = self.routed.write();
        while routed.len() < len {
            routed.push(AtomicU64::new(0));
        }
    }

    pub fn record_routed(&self, index: usize) {
        if let Some(counter) = self.routed.read().get(index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_spawn(&self, success: bool) {
        if success {
            self.spawns_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.spawns_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_call_issued(&self) {
        self.calls_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call_failed(&self) {
        self.calls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphan_response(&self) {
        self.orphan_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            routed: self
                .routed
                .read()
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            spawns_succeeded: self.spawns_succeeded.load(Ordering::Relaxed),
            spawns_failed: self.spawns_failed.load(Ordering::Relaxed),
            calls_issued: self.calls_issued.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            orphan_responses: self.orphan_responses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`PoolMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub routed: Vec<u64>,
    pub spawns_succeeded: u64,
    pub spawns_failed: u64,
    pub calls_issued: u64,
    pub calls_failed: u64,
    pub orphan_responses: u64,
}

impl PoolStats {
    pub fn total_routed(&self) -> u64 {
        self.routed.iter().sum()
    }

    /// Percentage of issued calls that failed
    pub fn call_failure_rate(&self) -> f64 {
        if self.calls_issued == 0 {
            return 0.0;
        }
        (self.calls_failed as f64 / self.calls_issued as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routed_counts_per_context() {
        let metrics = PoolMetrics::new();
        metrics.track_contexts(2);
        metrics.record_routed(0);
        metrics.record_routed(1);
        metrics.record_routed(0);
        // Out of range indices are ignored
        metrics.record_routed(5);

        let stats = metrics.snapshot();
        assert_eq!(stats.routed, vec![2, 1]);
        assert_eq!(stats.total_routed(), 3);
    }

    #[test]
    fn test_tracking_grows_only() {
        let metrics = PoolMetrics::new();
        metrics.track_contexts(3);
        metrics.track_contexts(1);
        assert_eq!(metrics.snapshot().routed.len(), 3);
    }

    #[test]
    fn test_call_failure_rate() {
        let metrics = PoolMetrics::new();
        assert_eq!(metrics.snapshot().call_failure_rate(), 0.0);

        for _ in 0..4 {
            metrics.record_call_issued();
        }
        metrics.record_call_failed();
        metrics.record_spawn(true);
        metrics.record_spawn(false);

        let stats = metrics.snapshot();
        assert_eq!(stats.call_failure_rate(), 25.0);
        assert_eq!(stats.spawns_succeeded, 1);
        assert_eq!(stats.spawns_failed, 1);
    }
}
