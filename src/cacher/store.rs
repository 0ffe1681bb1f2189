use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::MemoryStore;
use crate::error::CacheResult;

/// Byte-addressable backing store consumed by the dependency layer.
///
/// `get` must report a miss with [`CacheError::NotFound`](crate::CacheError::NotFound);
/// any other error is treated as a store failure.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Bytes>;
    fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()>;
    /// Returns whether a live entry was removed.
    fn delete(&self, key: &str) -> CacheResult<bool>;
    fn exists(&self, key: &str) -> CacheResult<bool>;
}

impl Store for MemoryStore<Bytes> {
    fn get(&self, key: &str) -> CacheResult<Bytes> {
        MemoryStore::get(self, key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        MemoryStore::set(self, key, value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        // an expired entry is still removed but does not count as live
        let live = MemoryStore::exists(self, key);
        Ok(MemoryStore::delete(self, key) && live)
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(MemoryStore::exists(self, key))
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> CacheResult<Bytes> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        (**self).exists(key)
    }
}
