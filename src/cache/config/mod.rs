//! Cache configuration with production defaults
//!
//! The defaults mirror a status cache sized for a few thousand files:
//! 200 retained keys and a live tier capped at 5000.

pub mod types;

pub use types::{STATISTICS_DIR_ENV, STATISTICS_ENV, StatisticsConfig, StatisticsMode, TurboConfig};
