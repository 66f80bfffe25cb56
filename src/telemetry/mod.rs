//! Telemetry module - cache statistics and their log sink
//!
//! Statistics are observational only: nothing recorded here feeds back into
//! cache control flow.

mod counters;
mod log_sink;
mod removal;
pub mod statistics;

pub use counters::StatisticsSnapshot;
pub use statistics::{RecordingStatistics, SUMMARY_INTERVAL, Statistics};
