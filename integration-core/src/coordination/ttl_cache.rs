//! A time-to-live cache with explicit, documented stampede behaviour and
//! earliest-expiry (not LRU) eviction when a maximum size is configured.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed cache where each entry carries its own absolute expiry.
///
/// `get_or_compute` does not serialize concurrent misses for the same key:
/// two callers racing a cache miss may both invoke the supplier. This is a
/// deliberate simplification, not an oversight — callers that cannot afford
/// a duplicated computation should gate it themselves (e.g. behind a
/// [`crate::coordination::circuit_breaker::CircuitBreaker`] or their own lock).
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    max_size: Option<usize>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: None,
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: Some(max_size),
        }
    }

    /// Returns the cached value if present and not expired. An expired entry
    /// is removed as a side effect of the lookup.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("ttl cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts or replaces a value with the given TTL. If a maximum size is
    /// configured and insertion would exceed it, the entry with the
    /// earliest expiry (which may be the one just inserted) is evicted.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().expect("ttl cache poisoned");
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );

        if let Some(max_size) = self.max_size {
            while entries.len() > max_size {
                if let Some(earliest_key) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&earliest_key);
                } else {
                    break;
                }
            }
        }
    }

    /// Returns the cached value, or calls `supplier` and caches its result
    /// under `ttl`. See the stampede note on the type itself.
    pub async fn get_or_compute<F, Fut>(&self, key: K, ttl: Duration, supplier: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = supplier().await;
        self.set(key, value.clone(), ttl);
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ttl cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn value_observable_until_ttl_then_not() {
        let cache: TtlCache<&str, i32> = TtlCache::new();
        cache.set("k", 1, Duration::from_millis(50));
        assert_eq!(cache.get(&"k"), Some(1));

        tokio::time::advance(Duration::from_millis(49)).await;
        assert_eq!(cache.get(&"k"), Some(1));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn max_size_evicts_earliest_expiry_on_overflow() {
        let cache: TtlCache<&str, i32> = TtlCache::with_max_size(3);
        cache.set("k1", 1, Duration::from_secs(10));
        cache.set("k2", 2, Duration::from_secs(20));
        cache.set("k3", 3, Duration::from_secs(30));
        cache.set("k4", 4, Duration::from_secs(40));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"k4"), Some(4));
        let survivors = ["k1", "k2", "k3"]
            .iter()
            .filter(|k| cache.get(k).is_some())
            .count();
        assert_eq!(survivors, 2, "exactly one of k1..k3 must have been evicted");
    }

    #[tokio::test]
    async fn get_or_compute_populates_cache() {
        let cache: TtlCache<&str, i32> = TtlCache::new();
        let value = cache
            .get_or_compute("k", Duration::from_secs(10), || async { 42 })
            .await;
        assert_eq!(value, 42);
        assert_eq!(cache.get(&"k"), Some(42));
    }
}
