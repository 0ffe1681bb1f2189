//! Dependency-indexed layer over a [`Store`].
//!
//! Every cache key can be asserted against any number of `(name, value)`
//! tags. Invalidating a tag deletes every key asserted against it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::error::CacheResult;
use crate::sync::lock::mutex_lock;
use crate::sync::{Arbiter, ArbiterGuard};

use super::keys::{sorted_tags, tag_key};
use super::store::Store;

const SOURCE: &str = "cacher::memory";
const METRIC_INVALIDATE_KEYS: &str = "tagcache_invalidate_keys_total";

/// Store plus arbiter plus tag → keys index.
pub struct DependencyCache<S> {
    store: S,
    arbiter: Arc<Arbiter>,
    /// Maps a tag's index key to the cache keys asserted against it
    index: Mutex<HashMap<String, HashSet<String>>>,
}

impl<S: Store> DependencyCache<S> {
    /// Layer over `store`, arbitrating through the process-wide arbiter.
    pub fn new(store: S) -> Self {
        Self::with_arbiter(store, Arbiter::global())
    }

    pub fn with_arbiter(store: S, arbiter: Arc<Arbiter>) -> Self {
        Self {
            store,
            arbiter,
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lock(&self, key: &str) {
        self.arbiter.lock(key);
    }

    pub fn unlock(&self, key: &str) {
        self.arbiter.unlock(key);
    }

    pub fn guard(&self, key: &str) -> ArbiterGuard<'_> {
        self.arbiter.guard(key)
    }

    pub fn get(&self, key: &str) -> CacheResult<Bytes> {
        self.store.get(key)
    }

    pub fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        self.store.set(key, value, ttl)
    }

    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(key)
    }

    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.exists(key)
    }

    /// Record that `key` depends on every tag in `dependencies`.
    pub fn assert<K, V, H>(&self, key: &str, dependencies: &HashMap<K, V, H>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = sorted_tags(dependencies);
        if tags.is_empty() {
            return;
        }

        let mut index = mutex_lock(&self.index, SOURCE, "assert");
        for (name, value) in tags {
            index
                .entry(tag_key(name, value))
                .or_default()
                .insert(key.to_owned());
        }
    }

    /// Delete every key asserted against `(name, value)`.
    ///
    /// The tag's key set is dropped from the index as part of the call, so a
    /// rebuilt entry has to be asserted again to become invalidatable.
    /// Returns the number of live entries deleted; keys that had already
    /// expired or been evicted are dropped from the index without counting.
    /// Deletion continues past a failing key and the first failure is
    /// returned.
    pub fn invalidate(&self, name: &str, value: &str) -> CacheResult<usize> {
        let keys = mutex_lock(&self.index, SOURCE, "invalidate")
            .remove(&tag_key(name, value))
            .unwrap_or_default();

        let mut deleted = 0_usize;
        let mut first_error = None;
        for key in &keys {
            match self.store.delete(key) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(tag = name, key = %key, error = %err, "Cache invalidation failed for key");
                    first_error.get_or_insert(err);
                }
            }
        }

        counter!(METRIC_INVALIDATE_KEYS).increment(deleted as u64);
        if deleted > 0 {
            info!(tag = name, value, deleted, "Cache tag invalidated");
        } else {
            debug!(tag = name, value, "Cache tag invalidated with no dependents");
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(deleted),
        }
    }

    /// Keys currently asserted against `(name, value)`.
    pub fn dependents(&self, name: &str, value: &str) -> HashSet<String> {
        mutex_lock(&self.index, SOURCE, "dependents")
            .get(&tag_key(name, value))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of tags with at least one asserted key.
    pub fn tag_count(&self) -> usize {
        mutex_lock(&self.index, SOURCE, "tag_count").len()
    }
}
