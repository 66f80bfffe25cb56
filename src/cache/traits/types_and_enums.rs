//! Essential value types and error enumerations for the attribute cache
//!
//! `Cached` distinguishes "we know the attribute is empty" from "we know nothing",
//! and `TurboError` is the single error type surfaced by the crate.

use serde::{Deserialize, Serialize};

/// A value recorded in the cache for one `(key, attribute)` pair.
///
/// A lookup that returns `None` is a miss; `Some(Cached::Null)` means the
/// attribute is known to be empty and there is no need to ask a provider again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cached<V> {
    /// Explicitly cached absence of a value
    Null,
    /// A real cached value
    Value(V),
}

impl<V> Cached<V> {
    /// Borrow the contained value, if any
    #[inline]
    pub fn value(&self) -> Option<&V> {
        match self {
            Cached::Null => None,
            Cached::Value(value) => Some(value),
        }
    }

    /// Consume into the contained value, if any
    #[inline]
    pub fn into_value(self) -> Option<V> {
        match self {
            Cached::Null => None,
            Cached::Value(value) => Some(value),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Cached::Null)
    }

    /// Internal storage form: explicit nulls are kept as `None`
    #[inline]
    pub(crate) fn into_stored(self) -> Option<V> {
        self.into_value()
    }

    #[inline]
    pub(crate) fn from_stored(stored: Option<V>) -> Self {
        match stored {
            Some(value) => Cached::Value(value),
            None => Cached::Null,
        }
    }
}

impl<V> From<Option<V>> for Cached<V> {
    fn from(value: Option<V>) -> Self {
        Cached::from_stored(value)
    }
}

/// Error category classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid sizes or settings at construction time
    Configuration,
    /// A provider failed to reach its backing store
    Provider,
}

/// Recovery hint for cache operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Retry with exponential backoff
    RetryBackoff,
    /// Fall back to alternative strategy
    Fallback,
    /// Rebuild the cache with corrected settings
    Restart,
}

/// Errors produced by the attribute cache
///
/// Cache misses are never errors; only construction misuse and provider
/// write failures are reported through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurboError {
    InvalidConfiguration(String),
    Provider(String),
    NoProvider(String),
}

impl std::fmt::Display for TurboError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurboError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            TurboError::Provider(msg) => write!(f, "Provider error: {}", msg),
            TurboError::NoProvider(name) => {
                write!(f, "No provider recognizes attribute: {}", name)
            }
        }
    }
}

impl std::error::Error for TurboError {}

impl TurboError {
    /// Create configuration error
    #[inline(always)]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create provider error
    #[inline(always)]
    pub fn provider_failed(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Error category for efficient classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfiguration(_) => ErrorCategory::Configuration,
            Self::Provider(_) | Self::NoProvider(_) => ErrorCategory::Provider,
        }
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::InvalidConfiguration(_) => RecoveryHint::Restart,
            Self::Provider(_) => RecoveryHint::RetryBackoff,
            Self::NoProvider(_) => RecoveryHint::Fallback,
        }
    }

    /// Check if operation can be retried
    pub fn retryable(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::RetryBackoff)
    }
}
