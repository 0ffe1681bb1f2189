//! In-process key/value storage.
//!
//! - [`MemoryStore`]: sharded buckets plus a background worker that keeps a
//!   promotion-counted recency list and prunes once `max_size` is exceeded.
//! - [`CacheValue`] / [`Counter`]: optional capabilities of stored values.
//! - [`Value`]: tagged value for stores holding mixed data.

mod config;
pub mod memory;
mod value;

pub use config::StoreConfig;
pub use memory::{MemoryStore, MultiGet};
pub use value::{CacheValue, Counter, Value};
