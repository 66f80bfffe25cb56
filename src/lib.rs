//! Turbo Cache - attribute cache for file-like entities
//!
//! Keeps `(entity, attribute) -> value` pairs in memory in front of slower
//! providers such as version-control status queries.
//!
//! # Features
//!
//! - **Two-tier memory**: a reachability-driven live tier plus an LRU floor
//! - **Explicit nulls**: "known to have no value" is cached like any value
//! - **Folder index**: directory to children map with cascading cleanup
//! - **Statistics**: optional counters and summaries behind `TURBO_STATISTICS`
//! - **Providers**: pluggable backing stores consulted on misses and writes

// Public API modules
pub mod prelude;
pub mod turbo;

// Cache implementation modules - traits are public for provider implementations
pub mod cache;
pub mod telemetry;

// Re-export the public API at the crate root for convenience
pub use cache::config::{StatisticsConfig, StatisticsMode, TurboConfig};
pub use cache::index::{CacheIndex, ManagedPredicate, ManagedRoots};
pub use cache::memory::{Memory, ReadContext};
pub use cache::traits::{Cached, MemoryCache, TurboError, TurboListener, TurboProvider};
pub use telemetry::{Statistics, StatisticsSnapshot};
pub use turbo::{ListenerRef, ProviderRef, Turbo, TurboBuilder};
