//! Provider extension point
//!
//! A provider owns the real, possibly slow, backing store for some
//! attributes of some entities. The cache asks providers in order and uses
//! the first one that recognizes both the entity and the attribute.

use std::hash::Hash;
use std::sync::Arc;

use super::types_and_enums::{Cached, TurboError};
use crate::cache::memory::Memory;

/// Backing-store contract consulted on cache misses and on writes
pub trait TurboProvider<K, V>: Send + Sync {
    /// Whether this provider serves `name`
    fn recognizes_attribute(&self, name: &str) -> bool;

    /// Whether this provider serves `key`
    fn recognizes_entity(&self, key: &K) -> bool;

    /// Load the attribute from the backing store
    ///
    /// `None` means the provider could not determine a value and nothing is
    /// cached. Related values computed on the way may be seeded through
    /// `memory`.
    fn read_entry(&self, key: &Arc<K>, name: &str, memory: &MemoryCache<'_, K, V>) -> Option<Cached<V>>;

    /// Store the attribute; `None` removes it
    ///
    /// Returns whether the write was accepted.
    fn write_entry(&self, key: &Arc<K>, name: &str, value: Option<&Cached<V>>) -> Result<bool, TurboError>;
}

/// Observer notified after an attribute write went through a provider
pub trait TurboListener<K, V>: Send + Sync {
    fn entry_changed(&self, key: &K, name: &str, value: Option<&Cached<V>>);
}

/// Write-through handle handed to `TurboProvider::read_entry`
///
/// The only way provider code may mutate the memory directly.
#[derive(Debug)]
pub struct MemoryCache<'a, K, V> {
    memory: Option<&'a Memory<K, V>>,
}

impl<K, V> Clone for MemoryCache<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for MemoryCache<'_, K, V> {}

impl<'a, K, V> MemoryCache<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(memory: &'a Memory<K, V>) -> Self {
        Self {
            memory: Some(memory),
        }
    }

    /// Handle that silently ignores every write
    pub fn disabled() -> Self {
        Self { memory: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.memory.is_some()
    }

    /// Seed the memory with a value the provider computed as a byproduct
    pub fn cache_entry(&self, key: &Arc<K>, name: &str, value: Option<Cached<V>>) {
        if let Some(memory) = self.memory {
            memory.put(key, name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Statistics;

    #[test]
    fn test_cache_entry_writes_through() {
        let memory: Memory<String, u32> =
            Memory::new(Arc::new(Statistics::disabled()), 4, None).unwrap();
        let handle = MemoryCache::new(&memory);
        let key = Arc::new("/repo/a.txt".to_string());

        assert!(handle.is_enabled());
        handle.cache_entry(&key, "status", Some(Cached::Value(3)));
        assert_eq!(memory.get(&key, "status"), Some(Cached::Value(3)));
    }

    #[test]
    fn test_disabled_handle_ignores_writes() {
        let handle = MemoryCache::<String, u32>::disabled();
        assert!(!handle.is_enabled());
        handle.cache_entry(&Arc::new("x".to_string()), "status", Some(Cached::Null));
    }
}
