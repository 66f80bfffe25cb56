//! Reclaimed-key detection
//!
//! Tracks the hashes of keys the memory reported as added and diffs them
//! against a fresh snapshot of live keys. Keys that disappeared without an
//! explicit removal were reclaimed because their owners dropped them.

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Minimum spacing between two diff passes
pub(crate) const COMPUTE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub(crate) struct RemovalTracker {
    known: HashSet<u64>,
    last_compute: Option<Instant>,
}

impl RemovalTracker {
    pub fn key_added(&mut self, key_hash: u64) {
        self.known.insert(key_hash);
    }

    pub fn key_removed(&mut self, key_hash: u64) {
        self.known.remove(&key_hash);
    }

    /// Whether a diff pass may run at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_compute
            .is_none_or(|last| now.duration_since(last) >= COMPUTE_INTERVAL)
    }

    /// Diff against the current live keys and return the reclaimed count
    pub fn compute(&mut self, live: HashSet<u64>, now: Instant) -> usize {
        self.last_compute = Some(now);
        let reclaimed = self.known.difference(&live).count();
        self.known = live;
        reclaimed
    }

    pub fn tracked(&self) -> usize {
        self.known.len()
    }
}
