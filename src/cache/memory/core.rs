//! Two-tier attribute memory
//!
//! Every key owns one attribute map. The map stays reachable while either
//! tier holds the key:
//!
//! - the **live** tier keeps only a `Weak` to the caller's `Arc<K>`, so the
//!   entry fades once every external handle is dropped, and is bounded by
//!   `maximum_size` through random-sample eviction over a dense key list;
//! - the **minimal** tier is an exact LRU over owned key clones holding the
//!   `minimum_size` most recently written or read-through keys no matter
//!   what happens to the handles.
//!
//! All operations run under one coarse lock; none of them perform I/O.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash, RandomState};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use rand::RngCore;

use super::eviction::{RandomSampler, sample_size};
use super::read_context::ReadContext;
use crate::cache::config::TurboConfig;
use crate::cache::config::types::validate_sizes;
use crate::cache::traits::{Cached, TurboError};
use crate::telemetry::Statistics;

/// Reclaimed live entries are swept once the slot count reaches this floor
const MIN_SWEEP_WATERMARK: usize = 64;

/// Attribute name to stored value; `None` is an explicitly cached null
type Attributes<V> = HashMap<String, Option<V>>;

/// Live tier membership of one slot
#[derive(Debug)]
struct LiveLink<K> {
    /// A dead handle means the key was reclaimed
    handle: Weak<K>,
    /// Position of the key in `MemoryState::live_keys`
    index: usize,
}

#[derive(Debug)]
struct Slot<K, V> {
    attributes: Attributes<V>,
    live: Option<LiveLink<K>>,
    /// Minimal tier membership as the key's LRU stamp
    recency: Option<u64>,
}

impl<K, V> Slot<K, V> {
    fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            live: None,
            recency: None,
        }
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|link| link.handle.strong_count() > 0)
    }

    #[inline]
    fn is_retained(&self) -> bool {
        self.is_live() || self.recency.is_some()
    }
}

#[derive(Debug)]
struct MemoryState<K, V> {
    slots: HashMap<K, Slot<K, V>>,
    /// Minimal tier in LRU order, oldest stamp first
    lru: BTreeMap<u64, K>,
    /// Keys with live tier membership, reclaimed ones included until swept
    live_keys: Vec<K>,
    clock: u64,
    sweep_watermark: usize,
    sampler: RandomSampler,
}

impl<K: Eq + Hash, V> MemoryState<K, V> {
    #[inline]
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Append `key` to the live list, returning its position
    fn link_live(&mut self, key: K) -> usize {
        self.live_keys.push(key);
        self.live_keys.len() - 1
    }

    /// Swap-remove the live key at `index`, repointing the key moved into its place
    fn unlink_live(&mut self, index: usize) {
        if index >= self.live_keys.len() {
            return;
        }
        self.live_keys.swap_remove(index);
        if let Some(moved) = self.live_keys.get(index)
            && let Some(link) = self
                .slots
                .get_mut(moved)
                .and_then(|slot| slot.live.as_mut())
        {
            link.index = index;
        }
    }
}

/// Key to attribute-map store with a bounded LRU floor and a reclaimable live tier
pub struct Memory<K, V> {
    state: Mutex<MemoryState<K, V>>,
    statistics: Arc<Statistics>,
    hasher: RandomState,
    minimum_size: usize,
    maximum_size: Option<usize>,
}

impl<K, V> Debug for Memory<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("minimum_size", &self.minimum_size)
            .field("maximum_size", &self.maximum_size)
            .field("statistics", &self.statistics.mode())
            .finish_non_exhaustive()
    }
}

impl<K, V> Memory<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a memory with OS-seeded eviction sampling
    ///
    /// `maximum_size: None` leaves the live tier unbounded. Fails when
    /// `minimum_size` is zero or `maximum_size` is below it.
    pub fn new(
        statistics: Arc<Statistics>,
        minimum_size: usize,
        maximum_size: Option<usize>,
    ) -> Result<Self, TurboError> {
        Self::build(statistics, minimum_size, maximum_size, RandomSampler::from_os_rng())
    }

    /// Create a memory drawing eviction victims from `rng`
    pub fn with_rng<R>(
        statistics: Arc<Statistics>,
        minimum_size: usize,
        maximum_size: Option<usize>,
        rng: R,
    ) -> Result<Self, TurboError>
    where
        R: RngCore + Send + 'static,
    {
        Self::build(statistics, minimum_size, maximum_size, RandomSampler::new(rng))
    }

    pub fn from_config(config: &TurboConfig, statistics: Arc<Statistics>) -> Result<Self, TurboError> {
        Self::new(statistics, config.minimum_size, config.maximum_size)
    }

    fn build(
        statistics: Arc<Statistics>,
        minimum_size: usize,
        maximum_size: Option<usize>,
        sampler: RandomSampler,
    ) -> Result<Self, TurboError> {
        validate_sizes(minimum_size, maximum_size)?;
        Ok(Self {
            state: Mutex::new(MemoryState {
                slots: HashMap::new(),
                lru: BTreeMap::new(),
                live_keys: Vec::new(),
                clock: 0,
                sweep_watermark: MIN_SWEEP_WATERMARK,
                sampler,
            }),
            statistics,
            hasher: RandomState::new(),
            minimum_size,
            maximum_size,
        })
    }

    pub fn minimum_size(&self) -> usize {
        self.minimum_size
    }

    pub fn maximum_size(&self) -> Option<usize> {
        self.maximum_size
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState<K, V>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::error!("Memory lock poisoned, continuing with recovered state");
            poisoned.into_inner()
        })
    }

    #[inline]
    fn key_hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Write one attribute; `None` removes it, `Cached::Null` records an empty value
    pub fn put(&self, key: &Arc<K>, name: &str, value: Option<Cached<V>>) {
        let mut guard = self.lock();
        self.write(&mut guard, key, name, value);
    }

    /// `put`, keeping a matching promise in `ctx` consistent with the write
    pub fn put_in(
        &self,
        key: &Arc<K>,
        name: &str,
        value: Option<Cached<V>>,
        ctx: &mut ReadContext<K, V>,
    ) {
        ctx.apply_write(key, name, value.as_ref());
        self.put(key, name, value);
    }

    /// Read one attribute; `None` is a miss
    ///
    /// A key found only in the minimal tier is promoted back into the live
    /// tier under the given handle.
    pub fn get(&self, key: &Arc<K>, name: &str) -> Option<Cached<V>> {
        let mut guard = self.lock();
        self.read(&mut guard, key, name)
    }

    /// `get`, falling back to the promise recorded by `exists_entry`
    ///
    /// A matching promise is consumed by this call whether or not it is used.
    pub fn get_in(&self, key: &Arc<K>, name: &str, ctx: &mut ReadContext<K, V>) -> Option<Cached<V>> {
        let promised = ctx.take_matching(key, name);
        let found = {
            let mut guard = self.lock();
            self.read(&mut guard, key, name)
        };
        found.or(promised)
    }

    /// Whether an entry, possibly an explicit null, is recorded for `name`
    ///
    /// On success the value is promised to `ctx` for the next `get_in`. On
    /// failure any stale promise is dropped and statistics may sweep for
    /// reclaimed keys.
    pub fn exists_entry(&self, key: &Arc<K>, name: &str, ctx: &mut ReadContext<K, V>) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let key: &K = key;

        let stored = if self.retained(state, key) {
            state
                .slots
                .get(key)
                .and_then(|slot| slot.attributes.get(name).cloned())
        } else {
            None
        };

        match stored {
            Some(stored) => {
                ctx.record(key.clone(), name, Cached::from_stored(stored));
                true
            }
            None => {
                ctx.clear();
                self.statistics
                    .compute_removed(|| self.live_key_hashes(state));
                false
            }
        }
    }

    /// The exact handle tracked in the live tier for a key equal to `key`
    pub fn get_monitored_key(&self, key: &K) -> Option<Arc<K>> {
        let guard = self.lock();
        guard.slots.get(key)?.live.as_ref()?.handle.upgrade()
    }

    /// Drop `key` from the live tier; the minimal tier is untouched
    ///
    /// Returns whether the key was tracked live.
    pub fn release(&self, key: &K) -> bool {
        let mut guard = self.lock();
        let tracked = guard.slots.get(key).is_some_and(|slot| slot.live.is_some());
        if tracked {
            self.drop_live(&mut guard, key);
        }
        tracked
    }

    /// Forget live entries whose keys were reclaimed, returning how many
    pub fn purge_reclaimed(&self) -> usize {
        let mut guard = self.lock();
        Self::purge(&mut guard)
    }

    /// Keys currently reachable through the live tier
    pub fn live_len(&self) -> usize {
        self.lock().slots.values().filter(|slot| slot.is_live()).count()
    }

    /// Keys held by the minimal tier
    pub fn minimal_len(&self) -> usize {
        self.lock().lru.len()
    }

    /// Keys retained by either tier
    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|slot| slot.is_retained())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, state: &mut MemoryState<K, V>, key: &Arc<K>, name: &str, value: Option<Cached<V>>) {
        Self::sweep_if_due(state);
        let k: &K = key;

        if !self.retained(state, k) {
            state.slots.insert(k.clone(), Slot::new());
        }
        if let Some(slot) = state.slots.get_mut(k) {
            match value {
                None => {
                    slot.attributes.remove(name);
                }
                Some(value) => {
                    slot.attributes.insert(name.to_owned(), value.into_stored());
                }
            }
        }

        self.promote_live(state, key);
        self.touch_minimal(state, k);
    }

    fn read(&self, state: &mut MemoryState<K, V>, key: &Arc<K>, name: &str) -> Option<Cached<V>> {
        let k: &K = key;
        if !self.retained(state, k) {
            return None;
        }

        let minimal_only = state.slots.get(k).is_some_and(|slot| !slot.is_live());
        if minimal_only {
            self.promote_live(state, key);
            self.touch_minimal(state, k);
        }

        state
            .slots
            .get(k)?
            .attributes
            .get(name)
            .cloned()
            .map(Cached::from_stored)
    }

    /// Whether `key` has a reachable slot; a stale one is discarded
    fn retained(&self, state: &mut MemoryState<K, V>, key: &K) -> bool {
        match state.slots.get(key).map(Slot::is_retained) {
            Some(true) => true,
            Some(false) => {
                Self::discard(state, key);
                false
            }
            None => false,
        }
    }

    fn promote_live(&self, state: &mut MemoryState<K, V>, key: &Arc<K>) {
        let k: &K = key;
        let tracked = match state.slots.get(k) {
            Some(slot) if slot.is_live() => return,
            Some(slot) => slot.live.as_ref().map(|link| link.index),
            None => return,
        };

        let index = match tracked {
            // reclaimed handle replaced by the caller's, position unchanged
            Some(index) => index,
            None => {
                if let Some(maximum) = self.maximum_size
                    && state.live_keys.len() >= maximum
                {
                    self.evict_live_sample(state, maximum);
                }
                state.link_live(k.clone())
            }
        };

        if let Some(slot) = state.slots.get_mut(k) {
            slot.live = Some(LiveLink {
                handle: Arc::downgrade(key),
                index,
            });
        }
        self.statistics.key_added(self.key_hash(k));
        self.statistics.live_size(state.live_keys.len());
    }

    /// Drop up to `sample_size(maximum)` random keys from the live tier
    ///
    /// Victims are drawn by position, so the cost does not depend on the
    /// tier size. Removed keys leave the list immediately, so draws are
    /// distinct.
    fn evict_live_sample(&self, state: &mut MemoryState<K, V>, maximum: usize) {
        let amount = sample_size(maximum);
        let mut evicted = 0;
        while evicted < amount {
            let Some(index) = state.sampler.pick(state.live_keys.len()) else {
                break;
            };
            let victim = state.live_keys[index].clone();
            self.drop_live(state, &victim);
            evicted += 1;
        }

        log::trace!(
            "Live tier full, evicted {} sampled keys ({} remain)",
            evicted,
            state.live_keys.len()
        );
    }

    fn drop_live(&self, state: &mut MemoryState<K, V>, key: &K) {
        let Some(slot) = state.slots.get_mut(key) else {
            return;
        };
        let link = slot.live.take();
        let minimal = slot.recency.is_some();
        if let Some(link) = link {
            state.unlink_live(link.index);
            self.statistics.key_removed(self.key_hash(key));
        }
        if !minimal {
            state.slots.remove(key);
        }
    }

    fn touch_minimal(&self, state: &mut MemoryState<K, V>, key: &K) {
        let stamp = state.tick();
        let Some(slot) = state.slots.get_mut(key) else {
            return;
        };
        let moved = match slot.recency.replace(stamp) {
            Some(previous) => state.lru.remove(&previous),
            None => None,
        };
        state.lru.insert(stamp, moved.unwrap_or_else(|| key.clone()));

        while state.lru.len() > self.minimum_size {
            let Some((_, evicted)) = state.lru.pop_first() else {
                break;
            };
            let still_live = match state.slots.get_mut(&evicted) {
                Some(slot) => {
                    slot.recency = None;
                    slot.is_live()
                }
                None => continue,
            };
            if !still_live {
                Self::discard(state, &evicted);
            }
        }
    }

    /// Remove a slot outright; reclaimed keys are reported by `compute_removed`
    fn discard(state: &mut MemoryState<K, V>, key: &K) {
        if let Some(slot) = state.slots.remove(key) {
            if let Some(link) = slot.live {
                state.unlink_live(link.index);
            }
            if let Some(stamp) = slot.recency {
                state.lru.remove(&stamp);
            }
        }
    }

    fn purge(state: &mut MemoryState<K, V>) -> usize {
        let reclaimed: Vec<K> = state
            .slots
            .iter()
            .filter(|(_, slot)| slot.live.is_some() && !slot.is_live())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &reclaimed {
            let Some(slot) = state.slots.get_mut(key) else {
                continue;
            };
            let link = slot.live.take();
            let minimal = slot.recency.is_some();
            if let Some(link) = link {
                state.unlink_live(link.index);
            }
            if !minimal {
                state.slots.remove(key);
            }
        }
        reclaimed.len()
    }

    fn sweep_if_due(state: &mut MemoryState<K, V>) {
        if state.slots.len() < state.sweep_watermark {
            return;
        }
        let purged = Self::purge(state);
        state.sweep_watermark = (state.slots.len() * 2).max(MIN_SWEEP_WATERMARK);
        if purged > 0 {
            log::trace!(
                "Swept {} reclaimed live keys, next sweep at {} slots",
                purged,
                state.sweep_watermark
            );
        }
    }

    fn live_key_hashes(&self, state: &MemoryState<K, V>) -> HashSet<u64> {
        state
            .slots
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .map(|(key, _)| self.key_hash(key))
            .collect()
    }
}
