use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::cache::value::{CacheValue, Counter};
use crate::error::{CacheError, CacheResult};
use crate::sync::lock::{rw_read, rw_write};

use super::entry::{Entry, Link};

const SOURCE: &str = "cache::memory::bucket";

/// The fixed set of shards; a key maps to the same bucket for the store's lifetime.
pub(crate) struct Buckets<V> {
    shards: Box<[Bucket<V>]>,
    mask: u32,
}

impl<V: CacheValue> Buckets<V> {
    pub(crate) fn new(count: usize) -> Self {
        debug_assert!(count.is_power_of_two());
        Self {
            shards: (0..count).map(|_| Bucket::new()).collect(),
            mask: (count - 1) as u32,
        }
    }

    pub(crate) fn bucket(&self, key: &str) -> &Bucket<V> {
        &self.shards[(fnv1a_32(key) & self.mask) as usize]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Bucket<V>> {
        self.shards.iter()
    }
}

fn fnv1a_32(key: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    key.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    })
}

/// One independently locked shard of the key space.
pub(crate) struct Bucket<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: CacheValue> Bucket<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Live value and its link, or `None` when missing or expired.
    pub(crate) fn get(&self, key: &str, now: Instant) -> Option<(V, Arc<Link>)> {
        let entries = rw_read(&self.entries, SOURCE, "get");
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| (entry.value.clone(), Arc::clone(&entry.link)))
    }

    pub(crate) fn exists(&self, key: &str, now: Instant) -> bool {
        rw_read(&self.entries, SOURCE, "exists")
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub(crate) fn ttl(&self, key: &str, now: Instant) -> Option<Option<Duration>> {
        rw_read(&self.entries, SOURCE, "ttl")
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.remaining(now))
    }

    /// Insert `value`, returning the new link and the link it displaced.
    pub(crate) fn set(
        &self,
        key: &str,
        value: V,
        ttl: Duration,
    ) -> (Arc<Link>, Option<Arc<Link>>) {
        let size = value.size_hint();
        let entry = Entry::new(key.to_owned(), value, size, ttl);
        let link = Arc::clone(&entry.link);
        let previous = rw_write(&self.entries, SOURCE, "set").insert(key.to_owned(), entry);
        let previous = previous.map(|old| {
            old.link.mark_removed();
            old.link
        });
        (link, previous)
    }

    /// Swap in a new entry for a live one, keeping its deadline.
    ///
    /// Returns the new link and the displaced one, or `None` when there is no
    /// live entry. The new link carries `value`'s size hint.
    pub(crate) fn replace(
        &self,
        key: &str,
        value: V,
        now: Instant,
    ) -> Option<(Arc<Link>, Arc<Link>)> {
        let mut entries = rw_write(&self.entries, SOURCE, "replace");
        let current = entries.get_mut(key).filter(|entry| !entry.is_expired(now))?;
        let size = value.size_hint();
        let entry = Entry::with_deadline(key.to_owned(), value, size, current.deadline());
        let link = Arc::clone(&entry.link);
        let previous = std::mem::replace(current, entry).link;
        previous.mark_removed();
        Some((link, previous))
    }

    pub(crate) fn delete(&self, key: &str) -> Option<Arc<Link>> {
        let removed = rw_write(&self.entries, SOURCE, "delete").remove(key)?;
        removed.link.mark_removed();
        Some(removed.link)
    }

    /// Remove the entry for `link`'s key only if it is still that very entry.
    pub(crate) fn evict(&self, link: &Arc<Link>) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "evict");
        let current = entries
            .get(link.key())
            .is_some_and(|entry| Arc::ptr_eq(&entry.link, link));
        if current {
            entries.remove(link.key());
        }
        link.mark_removed();
        current
    }

    pub(crate) fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        for entry in entries.values() {
            entry.link.mark_removed();
        }
        entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }
}

impl<V: CacheValue + Counter> Bucket<V> {
    pub(crate) fn adjust(&self, key: &str, delta: i64, now: Instant) -> CacheResult<()> {
        let mut entries = rw_write(&self.entries, SOURCE, "adjust");
        let entry = entries
            .get_mut(key)
            .filter(|entry| !entry.is_expired(now))
            .ok_or_else(|| CacheError::type_mismatch(key, "no live value to adjust"))?;
        if entry.value.adjust(delta) {
            Ok(())
        } else {
            Err(CacheError::type_mismatch(key, "value is not an integer"))
        }
    }
}
