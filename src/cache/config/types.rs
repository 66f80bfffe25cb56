//! Core configuration types and enums
//!
//! Sizes for the two memory tiers and the statistics switch. The statistics
//! mode is the only setting with an environment override.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::traits::TurboError;

/// Environment variable selecting the statistics mode
pub const STATISTICS_ENV: &str = "TURBO_STATISTICS";
/// Environment variable overriding the statistics log directory
pub const STATISTICS_DIR_ENV: &str = "TURBO_STATISTICS_DIR";

/// Statistics recording level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatisticsMode {
    /// Every statistics call is a no-op
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// Counters with periodic summaries
    #[serde(rename = "minimal")]
    Minimal,
    /// Counters plus per-key tracking of reclaimed entries
    #[serde(rename = "performance")]
    Performance,
}

impl StatisticsMode {
    /// Parse a mode name; unknown names yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" | "off" => Some(Self::Disabled),
            "minimal" => Some(Self::Minimal),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }

    /// Read the process-wide switch, defaulting to `Disabled`
    pub fn from_env() -> Self {
        match std::env::var(STATISTICS_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                log::warn!(
                    "Unknown {} value '{}', statistics disabled",
                    STATISTICS_ENV,
                    value
                );
                Self::Disabled
            }),
            Err(_) => Self::Disabled,
        }
    }

    #[inline]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Statistics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub mode: StatisticsMode,
    /// Directory receiving `turbo-statistics-<id>.log`
    pub log_dir: PathBuf,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            mode: StatisticsMode::Disabled,
            log_dir: std::env::temp_dir(),
        }
    }
}

impl StatisticsConfig {
    /// Defaults overlaid with `TURBO_STATISTICS` and `TURBO_STATISTICS_DIR`
    pub fn from_env() -> Self {
        let mut config = Self {
            mode: StatisticsMode::from_env(),
            ..Self::default()
        };
        if let Ok(dir) = std::env::var(STATISTICS_DIR_ENV)
            && !dir.trim().is_empty()
        {
            config.log_dir = PathBuf::from(dir);
        }
        config
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurboConfig {
    /// Most recently touched keys retained regardless of key reachability
    pub minimum_size: usize,
    /// Live tier bound; `None` leaves it to key reachability alone
    pub maximum_size: Option<usize>,
    pub statistics: StatisticsConfig,
}

impl Default for TurboConfig {
    fn default() -> Self {
        Self {
            minimum_size: 200,
            maximum_size: Some(5000),
            statistics: StatisticsConfig::default(),
        }
    }
}

impl TurboConfig {
    /// Defaults with the statistics section read from the environment
    pub fn from_env() -> Self {
        Self {
            statistics: StatisticsConfig::from_env(),
            ..Self::default()
        }
    }

    /// Check tier bounds
    pub fn validate(&self) -> Result<(), TurboError> {
        validate_sizes(self.minimum_size, self.maximum_size)
    }
}

/// Tier bounds shared by `TurboConfig` and `Memory::new`
pub(crate) fn validate_sizes(
    minimum_size: usize,
    maximum_size: Option<usize>,
) -> Result<(), TurboError> {
    if minimum_size == 0 {
        return Err(TurboError::invalid_configuration(
            "minimum size must be at least 1",
        ));
    }
    if let Some(maximum) = maximum_size
        && maximum < minimum_size
    {
        return Err(TurboError::invalid_configuration(format!(
            "maximum size {} is below minimum size {}",
            maximum, minimum_size
        )));
    }
    Ok(())
}
