//! In-process caching in three layers.
//!
//! - [`sync::Arbiter`]: named, reference-counted mutexes for per-key mutual
//!   exclusion.
//! - [`cache::MemoryStore`]: sharded buckets with lazy expiry, plus a
//!   background worker that keeps a promotion-counted recency list and prunes
//!   the least recently promoted entries once the size budget is exceeded.
//! - [`cacher::Cacher`]: fetch-or-build over any byte [`cacher::Store`], with
//!   at-most-once building per key and invalidation by dependency tag.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use tagcache::{CacheError, Cacher, MemoryStore, StoreConfig};
//!
//! let store: MemoryStore<Bytes> = MemoryStore::new(StoreConfig::default())?;
//! let cacher = Cacher::new(store);
//! let deps = HashMap::from([("user", "42")]);
//!
//! let name: String = cacher.fetch_data(
//!     "user-name",
//!     &deps,
//!     || Ok::<_, CacheError>("Ada".to_owned()),
//!     Duration::from_secs(60),
//! )?;
//! assert_eq!(name, "Ada");
//!
//! cacher.invalidate("user", "42")?;
//! # Ok::<(), CacheError>(())
//! ```

pub mod cache;
pub mod cacher;
pub mod config;
pub mod error;
pub mod sync;
pub mod telemetry;

pub use cache::{CacheValue, Counter, MemoryStore, MultiGet, StoreConfig, Value};
pub use cacher::{Cacher, DependencyCache, Store, Template};
pub use error::{CacheError, CacheResult};
pub use sync::{Arbiter, ArbiterGuard};
