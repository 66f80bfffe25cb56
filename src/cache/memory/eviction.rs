//! Random-sample eviction for the live tier
//!
//! The live tier does not track exact recency. When it is full a handful of
//! live keys is drawn at random and dropped from it. Each draw is a single
//! index into the dense list of live keys, so an overflow costs O(sample)
//! regardless of how large the tier is.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Upper bound on keys evicted per overflow
pub const MAX_SAMPLE: usize = 7;

/// Keys evicted from a full live tier: `min(7, maximum / 10)`, at least one
#[inline]
pub fn sample_size(maximum_size: usize) -> usize {
    (maximum_size / 10).clamp(1, MAX_SAMPLE)
}

/// Pluggable random source for victim selection
pub(crate) struct RandomSampler {
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for RandomSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSampler").finish_non_exhaustive()
    }
}

impl RandomSampler {
    pub fn new<R>(rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self { rng: Box::new(rng) }
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Uniform position in `0..len`, `None` when there is nothing to pick
    #[inline]
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.random_range(0..len))
    }
}
