//! Turbo Cache prelude - convenient imports for users
//!
//! Everything needed to build a cache and implement a provider.

// Re-export the public API
pub use crate::turbo::{ListenerRef, ProviderRef, Turbo, TurboBuilder};

// Provider extension point
pub use crate::cache::traits::{Cached, MemoryCache, TurboListener, TurboProvider};

// Re-export essential error types that users might need
pub use crate::cache::traits::types_and_enums::TurboError;

pub use crate::cache::config::{StatisticsMode, TurboConfig};
pub use crate::cache::index::{CacheIndex, ManagedPredicate, ManagedRoots};
pub use crate::cache::memory::ReadContext;
