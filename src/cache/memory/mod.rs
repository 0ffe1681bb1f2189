//! Sharded in-memory store with promotion-counted LRU eviction.
//!
//! Reads and writes only take the lock of the bucket that owns the key. All
//! cross-bucket bookkeeping (recency order, size total, pruning) happens on a
//! dedicated worker thread that is fed through bounded queues, so a slow
//! worker throttles producers instead of letting the queues grow.
//!
//! ```ignore
//! let store = MemoryStore::<Value>::new(StoreConfig::default())?;
//! store.set("visitors", Value::Int(0), Duration::from_secs(3600));
//! store.increase("visitors")?;
//! assert_eq!(store.get("visitors")?, Value::Int(1));
//! ```

mod bucket;
mod entry;
mod list;
mod worker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, bounded};
use metrics::counter;
use tracing::{info, trace, warn};

use crate::error::{CacheError, CacheResult};
use crate::sync::lock::mutex_lock;

use super::config::StoreConfig;
use super::value::{CacheValue, Counter};
use bucket::Buckets;
use entry::Link;
use worker::{Control, Worker};

const SOURCE: &str = "cache::memory";
const METRIC_STORE_HIT: &str = "tagcache_store_hit_total";
const METRIC_STORE_MISS: &str = "tagcache_store_miss_total";

/// Result of [`MemoryStore::get_multi`].
#[derive(Debug, Clone)]
pub struct MultiGet<V> {
    pub found: HashMap<String, V>,
    pub not_found: Vec<String>,
}

pub struct MemoryStore<V: CacheValue> {
    buckets: Arc<Buckets<V>>,
    promotables: Sender<Arc<Link>>,
    deletables: Sender<Arc<Link>>,
    control: Mutex<Option<Sender<Control>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<V: CacheValue> MemoryStore<V> {
    /// Build the store and start its worker thread.
    pub fn new(config: StoreConfig) -> CacheResult<Self> {
        let buckets = Arc::new(Buckets::new(config.bucket_count()));
        let (promotables, promote_rx) = bounded(config.promote_buffer);
        let (deletables, delete_rx) = bounded(config.delete_buffer);
        let (control, control_rx) = bounded(0);

        let worker = Worker::new(
            Arc::clone(&buckets),
            &config,
            promote_rx,
            delete_rx,
            control_rx,
        );
        let handle = thread::Builder::new()
            .name("tagcache-worker".to_string())
            .spawn(move || worker.run())
            .map_err(CacheError::WorkerSpawn)?;

        Ok(Self {
            buckets,
            promotables,
            deletables,
            control: Mutex::new(Some(control)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Fetch a live value. Expired entries report not-found even while they
    /// still occupy their bucket.
    pub fn get(&self, key: &str) -> CacheResult<V> {
        match self.buckets.bucket(key).get(key, Instant::now()) {
            Some((value, link)) => {
                counter!(METRIC_STORE_HIT).increment(1);
                self.promote(link);
                Ok(value)
            }
            None => {
                counter!(METRIC_STORE_MISS).increment(1);
                Err(CacheError::not_found(key))
            }
        }
    }

    /// Look up several keys at once; misses are collected rather than failing
    /// the batch.
    pub fn get_multi<I, K>(&self, keys: I) -> MultiGet<V>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut found = HashMap::new();
        let mut not_found = Vec::new();
        for key in keys {
            let key = key.as_ref();
            match self.get(key) {
                Ok(value) => {
                    found.insert(key.to_owned(), value);
                }
                Err(_) => not_found.push(key.to_owned()),
            }
        }
        MultiGet { found, not_found }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let (link, previous) = self.buckets.bucket(key).set(key, value, ttl);
        if let Some(previous) = previous {
            self.forget(previous);
        }
        self.promote(link);
    }

    /// Update the value of a live entry without touching its TTL. Returns
    /// false when there is nothing to replace.
    pub fn replace(&self, key: &str, value: V) -> bool {
        match self.buckets.bucket(key).replace(key, value, Instant::now()) {
            Some((link, previous)) => {
                self.forget(previous);
                self.promote(link);
                true
            }
            None => false,
        }
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        match self.buckets.bucket(key).delete(key) {
            Some(link) => {
                self.forget(link);
                true
            }
            None => false,
        }
    }

    /// True exactly when [`get`](Self::get) would succeed.
    pub fn exists(&self, key: &str) -> bool {
        self.buckets.bucket(key).exists(key, Instant::now())
    }

    /// Remaining lifetime of a live entry; `Some(None)` for entries that never
    /// expire.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.buckets.bucket(key).ttl(key, Instant::now())
    }

    /// Number of entries resident in the buckets, expired ones included.
    pub fn item_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Empty the store.
    ///
    /// Not meant to run concurrently with other operations; entries written
    /// while the clear is in flight may or may not survive it.
    pub fn clear(&self) {
        if self.request(Control::Clear).is_none() {
            for bucket in self.buckets.iter() {
                bucket.clear();
            }
        }
    }

    /// Wait until every promotion and deletion queued so far is applied.
    pub fn sync_updates(&self) {
        let _ = self.request(Control::Sync);
    }

    /// Force a pruning pass from the back of the recency list.
    pub fn gc(&self) {
        let _ = self.request(Control::Gc);
    }

    /// Entries evicted by pruning since the previous call.
    pub fn dropped(&self) -> usize {
        self.request(Control::Dropped).unwrap_or(0)
    }

    /// Size-hint total of the entries the worker is tracking.
    pub fn size(&self) -> i64 {
        self.request(Control::Size).unwrap_or(0)
    }

    /// Stop the worker once it has applied pending deletions. Later calls are
    /// no-ops, and so is background bookkeeping for operations issued after it.
    pub fn stop(&self) {
        drop(mutex_lock(&self.control, SOURCE, "stop").take());
        let handle = mutex_lock(&self.worker, SOURCE, "stop").take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Cache worker panicked before stopping");
            }
            info!(items = self.item_count(), "Cache worker stopped");
        }
    }

    fn promote(&self, link: Arc<Link>) {
        if self.promotables.send(link).is_err() {
            trace!("Promotion skipped: worker stopped");
        }
    }

    fn forget(&self, link: Arc<Link>) {
        if self.deletables.send(link).is_err() {
            trace!("Deletion bookkeeping skipped: worker stopped");
        }
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Control) -> Option<T> {
        let (reply, response) = bounded(1);
        {
            let control = mutex_lock(&self.control, SOURCE, "request");
            control.as_ref()?.send(make(reply)).ok()?;
        }
        response.recv().ok()
    }
}

impl<V: CacheValue + Counter> MemoryStore<V> {
    /// Add one to an integer value in place.
    pub fn increase(&self, key: &str) -> CacheResult<()> {
        self.buckets.bucket(key).adjust(key, 1, Instant::now())
    }

    /// Subtract one from an integer value in place.
    pub fn decrease(&self, key: &str) -> CacheResult<()> {
        self.buckets.bucket(key).adjust(key, -1, Instant::now())
    }
}

impl<V: CacheValue> Drop for MemoryStore<V> {
    fn drop(&mut self) {
        self.stop();
    }
}
