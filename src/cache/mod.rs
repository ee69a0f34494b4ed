//! A set-associative, fixed-capacity cache with second-chance ("clock") eviction.
//!
//! The cache is split into `num_sets` [`CacheSet`]s of `set_capacity` slots each. A key always
//! lives in the set `hash(key) % num_sets`. Each set is guarded by its own lock, and that lock is
//! also the unit of locking used by [`KvServer`] to keep the cache and the backing store in step.
//!
//! The entry operations (`get`/`put`/`del`) are methods on [`CacheSet`] and can only be reached
//! through the guard returned by [`KvCache::lock_for`]:
//!
//! ```rust
//! use kvcache::KvCache;
//!
//! let cache = KvCache::new(16, 4);
//! let mut set = cache.lock_for("hello");
//! set.put("hello".to_string(), "world".to_string());
//! assert_eq!(set.get("hello").as_deref(), Some("world"));
//! ```
//!
//! [`KvServer`]: crate::KvServer
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

mod set;
mod snapshot;

pub use self::set::{CacheEntry, CacheSet, PutOutcome};
pub use self::snapshot::{CacheSnapshot, EntrySnapshot, SetSnapshot};

/// scoped access to one [`CacheSet`]; the set's lock is released when the guard is dropped
pub type SetGuard<'a> = MutexGuard<'a, CacheSet>;

/// The front-end cache. See the [module documentation](self) for the layout.
#[derive(Debug)]
pub struct KvCache {
    sets: Vec<Mutex<CacheSet>>,
    set_capacity: usize,
}

impl KvCache {
    /// creates a cache with `num_sets` sets holding up to `set_capacity` entries each.
    ///
    /// # Panics
    /// Panics if either argument is zero.
    pub fn new(num_sets: usize, set_capacity: usize) -> Self {
        assert!(num_sets > 0, "a cache needs at least one set");
        assert!(set_capacity > 0, "a cache set needs at least one slot");
        debug!(num_sets, set_capacity, "creating cache");
        KvCache {
            sets: (0..num_sets)
                .map(|_| Mutex::new(CacheSet::new(set_capacity)))
                .collect(),
            set_capacity,
        }
    }

    /// number of sets
    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    /// number of slots in each set
    pub fn set_capacity(&self) -> usize {
        self.set_capacity
    }

    /// the index of the set that `key` belongs to. Depends on nothing but `key` and the number
    /// of sets
    pub fn set_id(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.sets.len() as u64) as usize
    }

    /// locks and returns the set that `key` belongs to
    pub fn lock_for(&self, key: &str) -> SetGuard<'_> {
        self.lock_set(self.set_id(key))
    }

    // a panic while a set is locked leaves no half-applied operation behind, so a poisoned
    // lock is still usable
    fn lock_set(&self, id: usize) -> SetGuard<'_> {
        self.sets[id].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// total number of valid entries across all sets. Locks the sets one at a time
    pub fn len(&self) -> usize {
        (0..self.sets.len()).map(|id| self.lock_set(id).len()).sum()
    }

    /// true if no set holds an entry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// copies out every valid entry, set by set. Sets are locked one at a time, so the result is
    /// consistent per set but not across sets
    pub fn snapshot(&self) -> CacheSnapshot {
        let sets = (0..self.sets.len())
            .map(|id| {
                let set = self.lock_set(id);
                SetSnapshot {
                    id,
                    entries: set
                        .entries()
                        .map(|e| EntrySnapshot {
                            key: e.key().to_string(),
                            value: e.value().to_string(),
                            referenced: e.is_referenced(),
                        })
                        .collect(),
                }
            })
            .collect();
        CacheSnapshot { sets }
    }
}

impl fmt::Display for KvCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.snapshot().to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(cache: &KvCache, key: &str) -> Option<String> {
        cache.lock_for(key).get(key)
    }

    fn put(cache: &KvCache, key: &str, value: &str) -> PutOutcome {
        cache.lock_for(key).put(key.to_string(), value.to_string())
    }

    #[test]
    fn single_put_and_get() {
        let cache = KvCache::new(1, 4);
        put(&cache, "hello", "world");
        assert_eq!(get(&cache, "hello").as_deref(), Some("world"));
    }

    #[test]
    fn second_chance_eviction_in_one_set() {
        let cache = KvCache::new(1, 3);
        put(&cache, "k1", "k1");
        put(&cache, "k2", "k2");
        put(&cache, "k3", "k3");
        assert_eq!(get(&cache, "k1").as_deref(), Some("k1"));

        put(&cache, "k4", "k4");
        assert!(get(&cache, "k2").is_none());
        assert!(get(&cache, "k1").is_some());
    }

    #[test]
    fn put_get_del_with_second_chance() {
        let cache = KvCache::new(1, 3);
        put(&cache, "k1", "k1");
        put(&cache, "k2", "k2");
        put(&cache, "k3", "k3");
        assert_eq!(get(&cache, "k1").as_deref(), Some("k1"));
        assert_eq!(put(&cache, "k1", "k2"), PutOutcome::Refreshed);
        assert_eq!(get(&cache, "k1").as_deref(), Some("k2"));

        put(&cache, "k4", "k4");
        assert!(get(&cache, "k1").is_some());
        assert!(get(&cache, "k2").is_none());

        put(&cache, "k5", "k5");
        assert!(get(&cache, "k3").is_none());

        cache.lock_for("k1").del("k1");
        assert!(get(&cache, "k1").is_none());
        put(&cache, "k1", "k1");
        put(&cache, "k2", "k2");
        assert!(get(&cache, "k4").is_none());
    }

    #[test]
    fn deleting_an_absent_key_is_a_no_op() {
        let cache = KvCache::new(4, 2);
        assert!(!cache.lock_for("nope").del("nope"));
        assert!(cache.is_empty());
    }

    #[test]
    fn sets_never_exceed_their_capacity() {
        let cache = KvCache::new(8, 3);
        for i in 0..500 {
            let key = format!("key{}", i % 97);
            put(&cache, &key, &i.to_string());
            if i % 3 == 0 {
                get(&cache, &format!("key{}", i % 13));
            }
        }
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.sets.len(), cache.num_sets());
        for set in &snapshot.sets {
            assert!(set.entries.len() <= cache.set_capacity());
        }
        assert!(cache.len() <= cache.num_sets() * cache.set_capacity());
    }

    #[test]
    fn set_mapping_is_deterministic() {
        let cache = KvCache::new(10, 10);
        let other = KvCache::new(10, 1);
        for key in ["a", "fuzzy", "key2", ""] {
            assert_eq!(cache.set_id(key), cache.set_id(key));
            assert_eq!(cache.set_id(key), other.set_id(key));
            assert!(cache.set_id(key) < 10);
        }
    }

    #[test]
    fn display_renders_the_snapshot() {
        let cache = KvCache::new(2, 2);
        put(&cache, "a&b", "1");
        let rendered = cache.to_string();
        assert!(rendered.starts_with("<?xml"));
        assert!(rendered.contains("<Key>a&amp;b</Key>"));
    }
}
