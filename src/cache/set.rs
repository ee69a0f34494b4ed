use std::collections::VecDeque;

use tracing::trace;

/// One slot of a [`CacheSet`]. A slot with `valid == false` is empty and its key/value are
/// meaningless.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    key: String,
    value: String,
    valid: bool,
    referenced: bool,
}

impl CacheEntry {
    /// the key held in this slot
    pub fn key(&self) -> &str {
        &self.key
    }

    /// the value held in this slot
    pub fn value(&self) -> &str {
        &self.value
    }

    /// true if the entry was read or refreshed since it was last considered for eviction
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }
}

/// What a [`CacheSet::put`] did to the set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// the key was already cached; its value was replaced in place
    Refreshed,
    /// the pair went into an empty slot
    Inserted,
    /// the set was full and `key` was evicted to make room, after `probes` looks at the clock head
    Evicted {
        /// the key that was dropped
        key: String,
        /// how many entries were popped off the clock before a victim was found
        probes: usize,
    },
}

/// One associative bucket of the cache: a fixed number of slots plus the clock order used by
/// second-chance eviction.
///
/// A `CacheSet` is only reachable through the guard returned by [`KvCache::lock_for`], so every
/// method here runs with the set's lock held.
///
/// [`KvCache::lock_for`]: super::KvCache::lock_for
#[derive(Debug)]
pub struct CacheSet {
    slots: Vec<CacheEntry>,
    // slot indices of the valid entries, oldest first
    clock: VecDeque<usize>,
}

impl CacheSet {
    pub(crate) fn new(capacity: usize) -> Self {
        CacheSet {
            slots: vec![CacheEntry::default(); capacity],
            clock: VecDeque::with_capacity(capacity),
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.slots.iter().position(|e| e.valid && e.key == key)
    }

    /// returns a copy of the value cached for `key` and marks the entry as referenced.
    /// The clock order is left as is
    pub fn get(&mut self, key: &str) -> Option<String> {
        let idx = self.find(key)?;
        let entry = &mut self.slots[idx];
        entry.referenced = true;
        Some(entry.value.clone())
    }

    /// caches `value` under `key`, evicting an entry with the second-chance policy if the set is
    /// full
    pub fn put(&mut self, key: String, value: String) -> PutOutcome {
        if let Some(idx) = self.find(&key) {
            let entry = &mut self.slots[idx];
            entry.value = value;
            entry.referenced = true;
            return PutOutcome::Refreshed;
        }

        if let Some(idx) = self.slots.iter().position(|e| !e.valid) {
            self.slots[idx] = CacheEntry {
                key,
                value,
                valid: true,
                referenced: false,
            };
            self.clock.push_back(idx);
            return PutOutcome::Inserted;
        }

        let mut probes = 0;
        let victim = loop {
            // the set is full, so the clock holds every slot
            let Some(idx) = self.clock.pop_front() else {
                unreachable!("a full cache set has an empty clock");
            };
            probes += 1;
            let entry = &mut self.slots[idx];
            if entry.referenced {
                entry.referenced = false;
                self.clock.push_back(idx);
            } else {
                break idx;
            }
        };
        debug_assert!(probes <= 2 * self.slots.len());

        let entry = &mut self.slots[victim];
        let evicted = std::mem::replace(&mut entry.key, key);
        entry.value = value;
        entry.referenced = false;
        self.clock.push_back(victim);
        trace!(evicted = %evicted, probes, "second-chance eviction");
        PutOutcome::Evicted { key: evicted, probes }
    }

    /// drops `key` from the set. Returns false if it was not cached
    pub fn del(&mut self, key: &str) -> bool {
        match self.find(key) {
            Some(idx) => {
                self.slots[idx].valid = false;
                self.slots[idx].referenced = false;
                self.clock.retain(|&i| i != idx);
                true
            }
            None => false,
        }
    }

    /// number of slots in the set
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// number of valid entries
    pub fn len(&self) -> usize {
        self.clock.len()
    }

    /// true if no slot holds an entry
    pub fn is_empty(&self) -> bool {
        self.clock.is_empty()
    }

    /// the valid entries in clock order, next eviction candidate first
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.clock.iter().map(move |&idx| &self.slots[idx])
    }

    /// the keys of the valid entries in clock order
    pub fn keys(&self) -> Vec<String> {
        self.entries().map(|e| e.key.clone()).collect()
    }
}
