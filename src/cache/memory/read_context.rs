//! Pending read context
//!
//! Carries the result of an `exists_entry` check to the following `get_in`
//! so the value survives even if the entry is reclaimed in between. The
//! caller owns the context; it is never shared between threads.

use crate::cache::traits::Cached;

#[derive(Debug, Clone)]
struct Promise<K, V> {
    key: K,
    name: String,
    value: Cached<V>,
}

/// Single-slot promise bridging an existence check and a read
#[derive(Debug, Clone)]
pub struct ReadContext<K, V> {
    promise: Option<Promise<K, V>>,
}

impl<K, V> Default for ReadContext<K, V> {
    fn default() -> Self {
        Self { promise: None }
    }
}

impl<K: Eq, V> ReadContext<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a promise is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.promise.is_some()
    }

    pub fn clear(&mut self) {
        self.promise = None;
    }

    pub(crate) fn record(&mut self, key: K, name: &str, value: Cached<V>) {
        self.promise = Some(Promise {
            key,
            name: name.to_owned(),
            value,
        });
    }

    fn matches(&self, key: &K, name: &str) -> bool {
        self.promise
            .as_ref()
            .is_some_and(|p| p.key == *key && p.name == name)
    }

    /// Consume the promise if it was made for `key` and `name`
    pub(crate) fn take_matching(&mut self, key: &K, name: &str) -> Option<Cached<V>> {
        if self.matches(key, name) {
            self.promise.take().map(|p| p.value)
        } else {
            None
        }
    }

    /// Keep a matching promise consistent with a write through this context
    pub(crate) fn apply_write(&mut self, key: &K, name: &str, value: Option<&Cached<V>>)
    where
        V: Clone,
    {
        if !self.matches(key, name) {
            return;
        }
        match value {
            Some(value) => {
                if let Some(promise) = self.promise.as_mut() {
                    promise.value = value.clone();
                }
            }
            None => self.promise = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promise_consumed_once() {
        let mut ctx = ReadContext::new();
        ctx.record("a.txt", "status", Cached::Value(1));

        assert_eq!(ctx.take_matching(&"a.txt", "other"), None);
        assert_eq!(ctx.take_matching(&"b.txt", "status"), None);
        assert!(ctx.is_pending());
        assert_eq!(ctx.take_matching(&"a.txt", "status"), Some(Cached::Value(1)));
        assert_eq!(ctx.take_matching(&"a.txt", "status"), None);
    }

    #[test]
    fn test_writes_update_or_invalidate() {
        let mut ctx = ReadContext::new();
        ctx.record("a.txt", "status", Cached::Value(1));

        ctx.apply_write(&"a.txt", "status", Some(&Cached::Null));
        ctx.apply_write(&"b.txt", "status", None);
        assert!(ctx.is_pending());

        let mut copy = ctx.clone();
        assert_eq!(copy.take_matching(&"a.txt", "status"), Some(Cached::Null));

        ctx.apply_write(&"a.txt", "status", None);
        assert!(!ctx.is_pending());
    }
}
