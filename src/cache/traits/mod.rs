//! Shared cache types and the provider extension point
//!
//! Value and error types live in `types_and_enums`; `provider` defines the
//! contract backing stores implement.

pub mod provider;
pub mod types_and_enums;

pub use provider::{MemoryCache, TurboListener, TurboProvider};
pub use types_and_enums::{Cached, ErrorCategory, RecoveryHint, TurboError};
