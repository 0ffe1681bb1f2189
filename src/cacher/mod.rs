//! Fetch-or-build caching with dependency-tag invalidation.
//!
//! [`Cacher::fetch_data`] computes a value at most once per key while it is
//! cached: concurrent callers for the same `(class, dependencies)` pair wait
//! on the key's arbiter latch and then read the freshly stored copy.
//! Invalidating any one dependency tag drops every cached value built
//! against it.

pub mod keys;
pub mod memory;
pub mod store;
pub mod template;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::sync::Arbiter;

pub use keys::{cache_key, tag_key};
pub use memory::DependencyCache;
pub use store::Store;
pub use template::{Askama, Raw, Template};

const METRIC_FETCH_BUILD: &str = "tagcache_fetch_build_total";
const METRIC_FETCH_BUILD_MS: &str = "tagcache_fetch_build_ms";

pub struct Cacher<S> {
    cache: DependencyCache<S>,
}

impl<S: Store> Cacher<S> {
    pub fn new(store: S) -> Self {
        Self {
            cache: DependencyCache::new(store),
        }
    }

    /// Cacher whose build arbitration is scoped to `arbiter` rather than the
    /// process-wide instance.
    pub fn with_arbiter(store: S, arbiter: Arc<Arbiter>) -> Self {
        Self {
            cache: DependencyCache::with_arbiter(store, arbiter),
        }
    }

    pub fn dependency_cache(&self) -> &DependencyCache<S> {
        &self.cache
    }

    pub fn store(&self) -> &S {
        self.cache.store()
    }

    /// Return the cached value for `(class, dependencies)`, building and
    /// caching it on a miss.
    ///
    /// The builder runs while the key's latch is held, so it must not fetch
    /// the same key again. A builder error is returned as is and nothing is
    /// cached.
    pub fn fetch_data<T, E, F, K, V, H>(
        &self,
        class: &str,
        dependencies: &HashMap<K, V, H>,
        builder: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key = cache_key(class, dependencies);
        let _guard = self.cache.guard(&key);

        match self.cache.get(&key) {
            Ok(bytes) => {
                debug!(class, key = %key, "Cache hit");
                return decode(&bytes).map_err(E::from);
            }
            Err(err) if err.is_not_found() => {
                debug!(class, key = %key, "Cache miss");
            }
            Err(err) => return Err(E::from(err)),
        }

        let started = Instant::now();
        let value = builder()?;
        let elapsed = started.elapsed();
        counter!(METRIC_FETCH_BUILD).increment(1);
        histogram!(METRIC_FETCH_BUILD_MS).record(elapsed.as_secs_f64() * 1_000.0);

        let encoded = encode(&value).map_err(E::from)?;
        self.cache.set(&key, encoded, ttl).map_err(E::from)?;
        self.cache.assert(&key, dependencies);
        debug!(
            class,
            key = %key,
            elapsed_ms = elapsed.as_millis() as u64,
            "Cache entry built"
        );

        Ok(value)
    }

    /// [`fetch_data`](Self::fetch_data) for rendered markup.
    ///
    /// The builder returns the template and the data to execute it with; the
    /// rendered string is what gets cached.
    pub fn fetch_html<Tpl, E, F, K, V, H>(
        &self,
        class: &str,
        dependencies: &HashMap<K, V, H>,
        builder: F,
        ttl: Duration,
    ) -> Result<String, E>
    where
        Tpl: Template,
        E: From<CacheError>,
        F: FnOnce() -> Result<(Tpl, Tpl::Data), E>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.fetch_data(
            class,
            dependencies,
            || {
                let (template, data) = builder()?;
                let mut out = String::new();
                template
                    .execute(&mut out, &data)
                    .map_err(|err| E::from(CacheError::from(err)))?;
                Ok(out)
            },
            ttl,
        )
    }

    /// Drop every cached value built against `(name, value)`.
    pub fn invalidate(&self, name: &str, value: &str) -> CacheResult<usize> {
        self.cache.invalidate(name, value)
    }
}

fn encode<T: Serialize>(value: &T) -> CacheResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
