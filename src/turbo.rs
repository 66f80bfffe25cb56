//! Public facade over the attribute memory and its providers
//!
//! `Turbo<K, V>` answers attribute reads from memory when it can and falls
//! back to the first provider that recognizes both the entity and the
//! attribute. Writes go through that provider first; memory is only updated
//! once the provider accepted the value.

use std::fmt::Debug;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cache::config::{StatisticsMode, TurboConfig};
use crate::cache::memory::{Memory, ReadContext};
use crate::cache::traits::{Cached, MemoryCache, TurboError, TurboListener, TurboProvider};
use crate::telemetry::Statistics;

/// Shared provider handle
pub type ProviderRef<K, V> = Arc<dyn TurboProvider<K, V>>;

/// Shared listener handle
pub type ListenerRef<K, V> = Arc<dyn TurboListener<K, V>>;

/// Attribute cache with pluggable backing providers
pub struct Turbo<K, V> {
    memory: Memory<K, V>,
    statistics: Arc<Statistics>,
    providers: Vec<ProviderRef<K, V>>,
    listeners: Mutex<Vec<ListenerRef<K, V>>>,
}

impl<K, V> Debug for Turbo<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turbo")
            .field("memory", &self.memory)
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> Turbo<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create new cache builder with fluent configuration
    pub fn builder() -> TurboBuilder<K, V> {
        TurboBuilder::new()
    }

    /// Cache over `providers` with explicit tier bounds
    ///
    /// Statistics follow the `TURBO_STATISTICS` environment switch.
    pub fn create_custom(
        providers: Vec<ProviderRef<K, V>>,
        minimum_size: usize,
        maximum_size: Option<usize>,
    ) -> Result<Self, TurboError> {
        providers
            .into_iter()
            .fold(Self::builder(), TurboBuilder::provider)
            .minimum_size(minimum_size)
            .maximum_size(maximum_size)
            .build()
    }

    pub fn memory(&self) -> &Memory<K, V> {
        &self.memory
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<ListenerRef<K, V>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn provider_for(&self, key: &K, name: &str) -> Option<&ProviderRef<K, V>> {
        self.providers
            .iter()
            .find(|provider| provider.recognizes_entity(key) && provider.recognizes_attribute(name))
    }

    /// Read an attribute, consulting providers on a memory miss
    ///
    /// `None` means neither memory nor any provider could supply a value.
    pub fn read_entry(&self, key: &Arc<K>, name: &str) -> Option<Cached<V>> {
        self.statistics.attribute_request();

        let mut ctx = ReadContext::new();
        if self.memory.exists_entry(key, name, &mut ctx) {
            self.statistics.memory_hit();
            return self.memory.get_in(key, name, &mut ctx);
        }

        let Some(provider) = self.provider_for(key, name) else {
            log::debug!("No provider recognizes attribute {}", name);
            return None;
        };

        let value = provider.read_entry(key, name, &MemoryCache::new(&self.memory))?;
        self.memory.put(key, name, Some(value.clone()));
        self.statistics.provider_hit();
        Some(value)
    }

    /// Whether `name` can be answered from memory without a provider call
    ///
    /// A `true` answer is promised to `ctx`, so a following
    /// `memory().get_in` with the same context cannot miss.
    pub fn is_prepared(&self, key: &Arc<K>, name: &str, ctx: &mut ReadContext<K, V>) -> bool {
        self.memory.exists_entry(key, name, ctx)
    }

    /// Store an attribute through its provider; `None` removes it
    ///
    /// Returns whether the provider accepted the write. Accepted writes
    /// update memory and are announced to every listener.
    pub fn write_entry(
        &self,
        key: &Arc<K>,
        name: &str,
        value: Option<Cached<V>>,
    ) -> Result<bool, TurboError> {
        let provider = self
            .provider_for(key, name)
            .ok_or_else(|| TurboError::NoProvider(name.to_owned()))?;

        let accepted = provider.write_entry(key, name, value.as_ref())?;
        if !accepted {
            log::debug!("Provider declined write of attribute {}", name);
            return Ok(false);
        }

        self.memory.put(key, name, value.clone());
        let listeners = self.listeners().clone();
        for listener in &listeners {
            listener.entry_changed(key, name, value.as_ref());
        }
        Ok(true)
    }

    pub fn add_listener(&self, listener: ListenerRef<K, V>) {
        self.listeners().push(listener);
    }

    /// Unregister a listener by identity, returning whether it was registered
    pub fn remove_listener(&self, listener: &ListenerRef<K, V>) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    /// Flush statistics and drop every listener
    pub fn shutdown(&self) {
        self.statistics.shutdown();
        self.listeners().clear();
        log::debug!("Turbo cache shut down");
    }
}

/// Fluent configuration for `Turbo`
pub struct TurboBuilder<K, V> {
    config: TurboConfig,
    providers: Vec<ProviderRef<K, V>>,
    eviction_seed: Option<u64>,
}

impl<K, V> TurboBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Builder seeded from `TurboConfig::from_env`
    pub fn new() -> Self {
        Self {
            config: TurboConfig::from_env(),
            providers: Vec::new(),
            eviction_seed: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: TurboConfig) -> Self {
        self.config = config;
        self
    }

    pub fn minimum_size(mut self, size: usize) -> Self {
        self.config.minimum_size = size;
        self
    }

    /// Live tier bound; `None` leaves it unbounded
    pub fn maximum_size(mut self, size: Option<usize>) -> Self {
        self.config.maximum_size = size;
        self
    }

    pub fn statistics_mode(mut self, mode: StatisticsMode) -> Self {
        self.config.statistics.mode = mode;
        self
    }

    pub fn statistics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.statistics.log_dir = dir.into();
        self
    }

    /// Append a provider; earlier providers win
    pub fn provider(mut self, provider: ProviderRef<K, V>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Make live-tier eviction sampling reproducible
    pub fn eviction_seed(mut self, seed: u64) -> Self {
        self.eviction_seed = Some(seed);
        self
    }

    /// Build the cache with the configured settings
    pub fn build(self) -> Result<Turbo<K, V>, TurboError> {
        self.config.validate()?;
        if self.providers.is_empty() {
            log::warn!("Turbo cache built without providers, misses cannot be filled");
        }

        let statistics = Arc::new(Statistics::new(&self.config.statistics));
        let memory = match self.eviction_seed {
            Some(seed) => Memory::with_rng(
                statistics.clone(),
                self.config.minimum_size,
                self.config.maximum_size,
                StdRng::seed_from_u64(seed),
            )?,
            None => Memory::from_config(&self.config, statistics.clone())?,
        };

        log::debug!(
            "Turbo cache ready: minimum={} maximum={:?} providers={} statistics={:?}",
            self.config.minimum_size,
            self.config.maximum_size,
            self.providers.len(),
            self.config.statistics.mode
        );
        Ok(Turbo {
            memory,
            statistics,
            providers: self.providers,
            listeners: Mutex::new(Vec::new()),
        })
    }
}

impl<K, V> Default for TurboBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Key = String;

    /// Provider backed by a map, serving `status` for keys under `/repo`
    #[derive(Default)]
    struct MapProvider {
        values: Mutex<HashMap<String, String>>,
        reads: AtomicUsize,
        reject_writes: bool,
    }

    impl MapProvider {
        fn with(entries: &[(&str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Self {
                values: Mutex::new(values),
                ..Self::default()
            }
        }
    }

    impl TurboProvider<Key, String> for MapProvider {
        fn recognizes_attribute(&self, name: &str) -> bool {
            name == "status"
        }

        fn recognizes_entity(&self, key: &Key) -> bool {
            key.starts_with("/repo")
        }

        fn read_entry(
            &self,
            key: &Arc<Key>,
            _name: &str,
            memory: &MemoryCache<'_, Key, String>,
        ) -> Option<Cached<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let values = self.values.lock().unwrap();
            if key.ends_with(".ignored") {
                return Some(Cached::Null);
            }
            let value = values.get(key.as_str())?.clone();
            let sibling = Arc::new(format!("{}.sibling", key));
            memory.cache_entry(&sibling, "status", Some(Cached::Value(value.clone())));
            Some(Cached::Value(value))
        }

        fn write_entry(
            &self,
            key: &Arc<Key>,
            _name: &str,
            value: Option<&Cached<String>>,
        ) -> Result<bool, TurboError> {
            if self.reject_writes {
                return Ok(false);
            }
            let mut values = self.values.lock().unwrap();
            match value.and_then(Cached::value) {
                Some(v) if v == "boom" => Err(TurboError::provider_failed("disk full")),
                Some(v) => {
                    values.insert(key.to_string(), v.clone());
                    Ok(true)
                }
                None => {
                    values.remove(key.as_str());
                    Ok(true)
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<(String, Option<String>)>>,
    }

    impl TurboListener<Key, String> for RecordingListener {
        fn entry_changed(&self, key: &Key, _name: &str, value: Option<&Cached<String>>) {
            self.events
                .lock()
                .unwrap()
                .push((key.clone(), value.and_then(Cached::value).cloned()));
        }
    }

    fn turbo(provider: Arc<MapProvider>) -> Turbo<Key, String> {
        Turbo::builder()
            .statistics_mode(StatisticsMode::Disabled)
            .minimum_size(8)
            .maximum_size(Some(100))
            .eviction_seed(7)
            .provider(provider)
            .build()
            .unwrap()
    }

    fn key(path: &str) -> Arc<Key> {
        Arc::new(path.to_string())
    }

    #[test]
    fn test_provider_read_is_cached() {
        let provider = Arc::new(MapProvider::with(&[("/repo/a.txt", "modified")]));
        let turbo = turbo(provider.clone());
        let k = key("/repo/a.txt");

        let expected = Some(Cached::Value("modified".to_string()));
        assert_eq!(turbo.read_entry(&k, "status"), expected);
        assert_eq!(turbo.read_entry(&k, "status"), expected);
        assert_eq!(provider.reads.load(Ordering::SeqCst), 1);

        let mut ctx = ReadContext::new();
        assert!(turbo.is_prepared(&k, "status", &mut ctx));
        assert_eq!(turbo.memory().get_in(&k, "status", &mut ctx), expected);
    }

    #[test]
    fn test_provider_can_seed_memory() {
        let provider = Arc::new(MapProvider::with(&[("/repo/a.txt", "added")]));
        let turbo = turbo(provider.clone());

        turbo.read_entry(&key("/repo/a.txt"), "status");
        let sibling = key("/repo/a.txt.sibling");
        assert_eq!(
            turbo.read_entry(&sibling, "status"),
            Some(Cached::Value("added".to_string()))
        );
        assert_eq!(provider.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_is_cached_but_missing_is_not() {
        let provider = Arc::new(MapProvider::default());
        let turbo = turbo(provider.clone());

        let ignored = key("/repo/build.ignored");
        assert_eq!(turbo.read_entry(&ignored, "status"), Some(Cached::Null));
        assert_eq!(turbo.read_entry(&ignored, "status"), Some(Cached::Null));
        assert_eq!(provider.reads.load(Ordering::SeqCst), 1);

        let unknown = key("/repo/unknown.txt");
        assert_eq!(turbo.read_entry(&unknown, "status"), None);
        assert_eq!(turbo.read_entry(&unknown, "status"), None);
        assert_eq!(provider.reads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unrecognized_reads_and_writes() {
        let turbo = turbo(Arc::new(MapProvider::default()));
        let outside = key("/tmp/a.txt");

        assert_eq!(turbo.read_entry(&outside, "status"), None);
        assert_eq!(turbo.read_entry(&key("/repo/a.txt"), "label"), None);
        assert_eq!(
            turbo.write_entry(&outside, "status", Some(Cached::Null)),
            Err(TurboError::NoProvider("status".to_string()))
        );
    }

    #[test]
    fn test_write_goes_through_provider_and_notifies() {
        let provider = Arc::new(MapProvider::default());
        let turbo = turbo(provider.clone());
        let listener = Arc::new(RecordingListener::default());
        let registered: ListenerRef<Key, String> = listener.clone();
        turbo.add_listener(registered.clone());

        let k = key("/repo/a.txt");
        let value = Some(Cached::Value("staged".to_string()));
        assert_eq!(turbo.write_entry(&k, "status", value.clone()), Ok(true));
        assert_eq!(turbo.memory().get(&k, "status"), value);
        assert_eq!(
            provider.values.lock().unwrap().get("/repo/a.txt").cloned(),
            Some("staged".to_string())
        );

        assert_eq!(turbo.write_entry(&k, "status", None), Ok(true));
        assert_eq!(turbo.memory().get(&k, "status"), None);

        assert_eq!(
            *listener.events.lock().unwrap(),
            vec![
                ("/repo/a.txt".to_string(), Some("staged".to_string())),
                ("/repo/a.txt".to_string(), None),
            ]
        );

        assert!(turbo.remove_listener(&registered));
        assert!(!turbo.remove_listener(&registered));
        turbo.write_entry(&k, "status", Some(Cached::Null)).unwrap();
        assert_eq!(listener.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_or_declined_write_leaves_memory() {
        let provider = Arc::new(MapProvider::default());
        let failing = turbo(provider);
        let k = key("/repo/a.txt");

        let err = failing
            .write_entry(&k, "status", Some(Cached::Value("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, TurboError::Provider(_)));
        assert_eq!(failing.memory().get(&k, "status"), None);

        let declining = Arc::new(MapProvider {
            reject_writes: true,
            ..MapProvider::default()
        });
        let declined = turbo(declining);
        assert_eq!(declined.write_entry(&k, "status", Some(Cached::Null)), Ok(false));
        assert_eq!(declined.memory().get(&k, "status"), None);
    }

    #[test]
    fn test_first_recognizing_provider_wins() {
        let first = Arc::new(MapProvider::with(&[("/repo/a.txt", "first")]));
        let second = Arc::new(MapProvider::with(&[("/repo/a.txt", "second")]));
        let providers = vec![first as ProviderRef<Key, String>, second.clone()];
        let turbo: Turbo<Key, String> = Turbo::create_custom(providers, 4, Some(40)).unwrap();

        assert_eq!(
            turbo.read_entry(&key("/repo/a.txt"), "status"),
            Some(Cached::Value("first".to_string()))
        );
        assert_eq!(second.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_bounds_fail_build() {
        let result: Result<Turbo<Key, String>, _> = Turbo::builder()
            .minimum_size(50)
            .maximum_size(Some(10))
            .build();
        assert!(matches!(result, Err(TurboError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_statistics_count_hits() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MapProvider::with(&[("/repo/a.txt", "clean")]));
        let turbo: Turbo<Key, String> = Turbo::builder()
            .statistics_mode(StatisticsMode::Minimal)
            .statistics_dir(dir.path())
            .provider(provider)
            .build()
            .unwrap();

        let k = key("/repo/a.txt");
        for _ in 0..3 {
            turbo.read_entry(&k, "status");
        }
        let snapshot = turbo.statistics().snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.provider_hits, 1);
        assert_eq!(snapshot.memory_hits, 2);

        turbo.shutdown();
    }
}
