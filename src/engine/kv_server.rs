use std::sync::Arc;

use tracing::{debug, trace};

use super::{KvStore, KvsEngine};
use crate::cache::{CacheSnapshot, KvCache};
use crate::{KvsError, Result};

/// The cache-aside key/value server.
///
/// Writes go to the [`KvStore`] first and then to the [`KvCache`]. Reads are answered from the
/// cache when possible, and a miss is filled from the store. All of this is serialized per key
/// by the lock of the cache set that the key maps to; no operation ever holds two set locks.
///
/// Cloning a `KvServer` is cheap: clones share the same cache and store.
#[derive(Debug, Clone)]
pub struct KvServer {
    cache: Arc<KvCache>,
    store: Arc<KvStore>,
}

impl KvServer {
    /// creates a server with an empty store and a cache of `num_sets` × `set_capacity` entries
    ///
    /// # Panics
    /// Panics if either argument is zero.
    pub fn new(num_sets: usize, set_capacity: usize) -> Self {
        KvServer::with_store(KvCache::new(num_sets, set_capacity), KvStore::new())
    }

    /// creates a server over an existing cache and store
    pub fn with_store(cache: KvCache, store: KvStore) -> Self {
        KvServer {
            cache: Arc::new(cache),
            store: Arc::new(store),
        }
    }

    /// the front-end cache
    pub fn cache(&self) -> &KvCache {
        &self.cache
    }

    /// the authoritative store
    pub fn store(&self) -> &KvStore {
        &self.store
    }

    /// a diagnostic copy of the cache contents
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(KvsError::InvalidKey)
    } else {
        Ok(())
    }
}

fn check_value(value: &str) -> Result<()> {
    if value.is_empty() {
        Err(KvsError::InvalidValue)
    } else {
        Ok(())
    }
}

impl KvsEngine for KvServer {
    fn put(&self, key: String, value: String) -> Result<()> {
        check_key(&key)?;
        check_value(&value)?;

        let mut set = self.cache.lock_for(&key);
        // the store is written first so the cache is never ahead of it
        self.store.put(key.clone(), value.clone());
        let outcome = set.put(key, value);
        trace!(?outcome, "cache updated by put");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String> {
        check_key(key)?;

        let cached = self.cache.lock_for(key).get(key);
        if let Some(value) = cached {
            trace!(key, "cache hit");
            return Ok(value);
        }

        // the set lock is not held across the store read; a concurrent write to the same key
        // may land in between and the refill below can then cache an older value
        debug!(key, "cache miss");
        let value = self.store.get(key)?;
        self.cache
            .lock_for(key)
            .put(key.to_string(), value.clone());
        Ok(value)
    }

    fn del(&self, key: &str) -> Result<()> {
        check_key(key)?;

        let mut set = self.cache.lock_for(key);
        self.store.del(key)?;
        set.del(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_happens_before_any_lookup() {
        let server = KvServer::new(10, 10);
        assert!(matches!(server.put("".into(), "a".into()), Err(KvsError::InvalidKey)));
        assert!(matches!(server.put("k1".into(), "".into()), Err(KvsError::InvalidValue)));
        assert!(matches!(server.get(""), Err(KvsError::InvalidKey)));
        assert!(matches!(server.del(""), Err(KvsError::InvalidKey)));
        assert!(matches!(server.has_key(""), Err(KvsError::InvalidKey)));
        assert!(server.store().is_empty());
    }

    #[test]
    fn put_writes_through_to_store_and_cache() {
        let server = KvServer::new(4, 2);
        server.put("k1".into(), "v1".into()).unwrap();
        assert_eq!(server.store().get("k1").unwrap(), "v1");
        assert_eq!(server.cache().lock_for("k1").get("k1").as_deref(), Some("v1"));
    }

    #[test]
    fn miss_refills_the_cache_from_the_store() {
        let server = KvServer::new(1, 1);
        server.put("a".into(), "1".into()).unwrap();
        server.put("b".into(), "2".into()).unwrap();
        // "a" has been evicted by "b" in the single slot
        assert!(server.cache().lock_for("a").get("a").is_none());

        assert_eq!(server.get("a").unwrap(), "1");
        assert_eq!(server.cache().lock_for("a").get("a").as_deref(), Some("1"));
        assert!(server.cache().lock_for("b").get("b").is_none());
    }

    #[test]
    fn failed_delete_leaves_the_cache_alone() {
        let server = KvServer::new(2, 2);
        // a pair that is cached but not in the store can only exist through the cache itself
        server.cache().lock_for("ghost").put("ghost".into(), "boo".into());
        assert!(matches!(server.del("ghost"), Err(KvsError::NoSuchKey)));
        assert_eq!(server.cache().lock_for("ghost").get("ghost").as_deref(), Some("boo"));
    }

    #[test]
    fn delete_removes_from_both_layers() {
        let server = KvServer::new(2, 2);
        server.put("k".into(), "v".into()).unwrap();
        server.del("k").unwrap();
        assert!(server.cache().is_empty());
        assert!(server.store().is_empty());
        assert!(matches!(server.del("k"), Err(KvsError::NoSuchKey)));
    }

    #[test]
    fn has_key_maps_missing_keys_to_false() {
        let server = KvServer::new(10, 10);
        server.put("k1".into(), "k1".into()).unwrap();
        assert!(server.has_key("k1").unwrap());
        assert!(!server.has_key("k2").unwrap());
    }

    /// two servers that went through the same puts
    fn twin_servers(num_sets: usize, set_capacity: usize, keys: &[&str]) -> (KvServer, KvServer) {
        let probed = KvServer::new(num_sets, set_capacity);
        let read = KvServer::new(num_sets, set_capacity);
        for key in keys {
            probed.put(key.to_string(), key.to_string()).unwrap();
            read.put(key.to_string(), key.to_string()).unwrap();
        }
        (probed, read)
    }

    #[test]
    fn has_key_touches_the_cache_like_get() {
        // missing key: nothing is cached
        let (server, _) = twin_servers(1, 2, &["a", "b"]);
        let before = server.cache_snapshot();
        assert!(!server.has_key("missing").unwrap());
        assert_eq!(server.cache_snapshot(), before);

        // cached key: the reference bit is set exactly as a get sets it
        let (probed, read) = twin_servers(1, 2, &["a", "b"]);
        assert!(probed.has_key("a").unwrap());
        read.get("a").unwrap();
        assert_eq!(probed.cache_snapshot(), read.cache_snapshot());
        assert!(probed.cache_snapshot().sets[0]
            .entries
            .iter()
            .any(|e| e.key == "a" && e.referenced));

        // stored but evicted key: the miss refills the cache as a get does
        let (probed, read) = twin_servers(1, 1, &["a", "b"]);
        assert!(probed.has_key("a").unwrap());
        read.get("a").unwrap();
        assert_eq!(probed.cache_snapshot(), read.cache_snapshot());
        assert_eq!(probed.cache().lock_for("a").get("a").as_deref(), Some("a"));
    }
}
