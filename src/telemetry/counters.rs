//! Atomic statistics counters with cache-line alignment
//!
//! Every counter is monotonic except the two running maxima, which only grow.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};

/// Lock-free counter block shared by the recording statistics
#[derive(Debug, Default)]
pub(crate) struct StatisticsCounters {
    requests: CachePadded<AtomicU64>,
    memory_hits: CachePadded<AtomicU64>,
    provider_hits: CachePadded<AtomicU64>,
    background_threads: CachePadded<AtomicU64>,
    duplicates: CachePadded<AtomicU64>,
    max_queue_size: CachePadded<AtomicU64>,
    max_live_size: CachePadded<AtomicU64>,
    keys_added: CachePadded<AtomicU64>,
    keys_removed: CachePadded<AtomicU64>,
    reclaimed: CachePadded<AtomicU64>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub requests: u64,
    pub memory_hits: u64,
    pub provider_hits: u64,
    pub background_threads: u64,
    pub duplicates: u64,
    pub max_queue_size: u64,
    pub max_live_size: u64,
    pub keys_added: u64,
    pub keys_removed: u64,
    pub reclaimed: u64,
}

impl StatisticsSnapshot {
    /// Fraction of requests answered from memory
    pub fn memory_hit_ratio(&self) -> f64 {
        if self.requests > 0 {
            self.memory_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }
}

impl StatisticsCounters {
    /// Count one attribute request, returning the new total
    #[inline(always)]
    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline(always)]
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_provider_hit(&self) {
        self.provider_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_background_thread(&self) {
        self.background_threads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_queue_size(&self, size: usize) {
        self.max_queue_size.fetch_max(size as u64, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_live_size(&self, size: usize) {
        self.max_live_size.fetch_max(size as u64, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_key_added(&self) {
        self.keys_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_key_removed(&self) {
        self.keys_removed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_reclaimed(&self, count: usize) {
        self.reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            provider_hits: self.provider_hits.load(Ordering::Relaxed),
            background_threads: self.background_threads.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            max_queue_size: self.max_queue_size.load(Ordering::Relaxed),
            max_live_size: self.max_live_size.load(Ordering::Relaxed),
            keys_added: self.keys_added.load(Ordering::Relaxed),
            keys_removed: self.keys_removed.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_maxima_only_grow() {
        let counters = StatisticsCounters::default();
        counters.record_queue_size(4);
        counters.record_queue_size(2);
        counters.record_live_size(10);
        counters.record_live_size(12);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.max_queue_size, 4);
        assert_eq!(snapshot.max_live_size, 12);
    }

    #[test]
    fn test_hit_ratio() {
        let counters = StatisticsCounters::default();
        assert_eq!(counters.snapshot().memory_hit_ratio(), 0.0);

        for _ in 0..4 {
            counters.record_request();
        }
        counters.record_memory_hit();
        assert_eq!(counters.snapshot().memory_hit_ratio(), 0.25);
    }
}
