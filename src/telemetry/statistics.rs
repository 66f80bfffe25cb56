//! Cache statistics sink
//!
//! `Statistics::Disabled` costs nothing; the recording variant keeps atomic
//! counters and appends summary lines to a per-instance log file. Nothing in
//! here may fail the caller's cache operation.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use uuid::Uuid;

use super::counters::{StatisticsCounters, StatisticsSnapshot};
use super::log_sink::LogSink;
use super::removal::RemovalTracker;
use crate::cache::config::{StatisticsConfig, StatisticsMode};

/// Requests between two summary lines
pub const SUMMARY_INTERVAL: u64 = 1000;

/// Statistics sink selected once at construction
#[derive(Debug, Default)]
pub enum Statistics {
    #[default]
    Disabled,
    Recording(Box<RecordingStatistics>),
}

/// Counters, reclaimed-key tracking and the lazily opened log
#[derive(Debug)]
pub struct RecordingStatistics {
    mode: StatisticsMode,
    id: Uuid,
    counters: StatisticsCounters,
    removal: Mutex<RemovalTracker>,
    sink: LogSink,
    started: Instant,
}

impl Statistics {
    /// Build from the process-wide `TURBO_STATISTICS` switch
    pub fn create_instance() -> Self {
        Self::new(&StatisticsConfig::from_env())
    }

    pub fn new(config: &StatisticsConfig) -> Self {
        match config.mode {
            StatisticsMode::Disabled => Self::Disabled,
            mode => {
                let id = Uuid::new_v4();
                let path = config
                    .log_dir
                    .join(format!("turbo-statistics-{}.log", id));
                log::debug!("Turbo statistics ({:?}) will log to {}", mode, path.display());
                Self::Recording(Box::new(RecordingStatistics {
                    mode,
                    id,
                    counters: StatisticsCounters::default(),
                    removal: Mutex::new(RemovalTracker::default()),
                    sink: LogSink::new(path),
                    started: Instant::now(),
                }))
            }
        }
    }

    /// No-op instance
    pub fn disabled() -> Self {
        Self::Disabled
    }

    pub fn mode(&self) -> StatisticsMode {
        match self {
            Self::Disabled => StatisticsMode::Disabled,
            Self::Recording(stats) => stats.mode,
        }
    }

    #[inline]
    fn recording(&self) -> Option<&RecordingStatistics> {
        match self {
            Self::Disabled => None,
            Self::Recording(stats) => Some(stats),
        }
    }

    #[inline]
    fn tracking_keys(&self) -> Option<&RecordingStatistics> {
        self.recording()
            .filter(|stats| stats.mode == StatisticsMode::Performance)
    }

    /// A key entered the live tier
    pub fn key_added(&self, key_hash: u64) {
        if let Some(stats) = self.tracking_keys() {
            stats.counters.record_key_added();
            stats.removal().key_added(key_hash);
        }
    }

    /// A key was evicted from the live tier on purpose
    pub fn key_removed(&self, key_hash: u64) {
        if let Some(stats) = self.tracking_keys() {
            stats.counters.record_key_removed();
            stats.removal().key_removed(key_hash);
        }
    }

    /// Detect keys reclaimed since the previous pass
    ///
    /// `live_keys` is only invoked when a pass actually runs, at most once
    /// every ten seconds, because building the snapshot is O(n).
    pub fn compute_removed<F>(&self, live_keys: F)
    where
        F: FnOnce() -> HashSet<u64>,
    {
        let Some(stats) = self.tracking_keys() else {
            return;
        };

        let now = Instant::now();
        let mut removal = stats.removal();
        if !removal.is_due(now) {
            return;
        }
        let reclaimed = removal.compute(live_keys(), now);
        let tracked = removal.tracked();
        drop(removal);

        if reclaimed > 0 {
            stats.counters.record_reclaimed(reclaimed);
            stats.write(&format!(
                "reclaimed keys={} still_live={}",
                reclaimed, tracked
            ));
        }
    }

    /// One attribute request; every `SUMMARY_INTERVAL`th request dumps a summary
    pub fn attribute_request(&self) {
        if let Some(stats) = self.recording() {
            let requests = stats.counters.record_request();
            if requests % SUMMARY_INTERVAL == 0 {
                stats.write_summary();
            }
        }
    }

    pub fn memory_hit(&self) {
        if let Some(stats) = self.recording() {
            stats.counters.record_memory_hit();
        }
    }

    pub fn provider_hit(&self) {
        if let Some(stats) = self.recording() {
            stats.counters.record_provider_hit();
        }
    }

    /// The owner spawned a background loader
    pub fn background_thread(&self) {
        if let Some(stats) = self.recording() {
            stats.counters.record_background_thread();
        }
    }

    /// The owner suppressed a duplicate in-flight request
    pub fn duplicate(&self) {
        if let Some(stats) = self.recording() {
            stats.counters.record_duplicate();
        }
    }

    pub fn queue_size(&self, size: usize) {
        if let Some(stats) = self.recording() {
            stats.counters.record_queue_size(size);
        }
    }

    /// Live tier size after an insertion
    pub fn live_size(&self, size: usize) {
        if let Some(stats) = self.recording() {
            stats.counters.record_live_size(size);
        }
    }

    /// Counter snapshot; all zeros when disabled
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.recording()
            .map(|stats| stats.counters.snapshot())
            .unwrap_or_default()
    }

    /// Write a final summary and close the log
    pub fn shutdown(&self) {
        if let Some(stats) = self.recording() {
            stats.write_summary();
            stats.sink.close();
            log::debug!("Turbo statistics {} shut down", stats.id);
        }
    }
}

impl RecordingStatistics {
    fn removal(&self) -> MutexGuard<'_, RemovalTracker> {
        self.removal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn log_path(&self) -> &std::path::Path {
        self.sink.path()
    }

    fn write(&self, message: &str) {
        let elapsed_ms = self.started.elapsed().as_millis();
        self.sink.write_line(&format!("[{:>10}ms] {}", elapsed_ms, message));
    }

    fn write_summary(&self) {
        let snapshot = self.counters.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => self.write(&format!("summary {}", json)),
            Err(e) => log::warn!("Failed to serialize statistics snapshot: {}", e),
        }
        self.sink.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(mode: StatisticsMode, dir: &std::path::Path) -> StatisticsConfig {
        StatisticsConfig {
            mode,
            log_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_disabled_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Statistics::new(&config(StatisticsMode::Disabled, dir.path()));

        stats.key_added(1);
        stats.key_removed(1);
        stats.compute_removed(|| panic!("snapshot must not be built"));
        for _ in 0..SUMMARY_INTERVAL {
            stats.attribute_request();
        }
        stats.memory_hit();
        stats.provider_hit();
        stats.background_thread();
        stats.duplicate();
        stats.queue_size(8);
        stats.live_size(8);
        stats.shutdown();

        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_summary_written_every_interval() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Statistics::new(&config(StatisticsMode::Minimal, dir.path()));
        let Statistics::Recording(recording) = &stats else {
            panic!("expected recording statistics");
        };
        let path = recording.log_path().to_path_buf();

        for _ in 0..SUMMARY_INTERVAL - 1 {
            stats.attribute_request();
        }
        assert!(!path.exists());

        stats.memory_hit();
        stats.attribute_request();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"requests\":1000"));
        assert!(contents.contains("\"memory_hits\":1"));

        stats.shutdown();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_minimal_mode_skips_key_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Statistics::new(&config(StatisticsMode::Minimal, dir.path()));

        stats.key_added(7);
        stats.compute_removed(|| panic!("minimal mode must not diff keys"));
        assert_eq!(stats.snapshot().keys_added, 0);
    }

    #[test]
    fn test_performance_mode_reports_reclaimed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Statistics::new(&config(StatisticsMode::Performance, dir.path()));

        stats.key_added(1);
        stats.key_added(2);
        stats.key_added(3);
        stats.key_removed(3);
        stats.compute_removed(|| [2].into_iter().collect());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.keys_added, 3);
        assert_eq!(snapshot.keys_removed, 1);
        assert_eq!(snapshot.reclaimed, 1);

        // throttled: a second pass inside the window never builds the snapshot
        stats.compute_removed(|| panic!("throttled"));
        stats.shutdown();
    }
}
