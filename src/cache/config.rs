//! Memory store configuration.
//!
//! Every option has a default, so `StoreConfig::default()` is a complete
//! configuration. The same struct is deserialized from the `[store]` table of
//! `tagcache.toml`:
//!
//! ```toml
//! [store]
//! max_size = 16000000
//! buckets = 4          # 2^4 = 16 shards
//! items_to_prune = 500
//! ```

use serde::Deserialize;

const DEFAULT_MAX_SIZE: i64 = 16_000_000;
const DEFAULT_BUCKETS: u32 = 4;
const DEFAULT_ITEMS_TO_PRUNE: usize = 500;
const DEFAULT_DELETE_BUFFER: usize = 1024;
const DEFAULT_PROMOTE_BUFFER: usize = 1024;
const DEFAULT_GETS_PER_PROMOTE: u32 = 3;
const MAX_BUCKET_BITS: u32 = 16;

/// Construction options for a [`MemoryStore`](super::MemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Total size-hint units kept before a pruning pass runs.
    pub max_size: i64,
    /// Shard count as a power of two (`4` means 16 buckets).
    pub buckets: u32,
    /// Entries evicted from the back of the recency list per pruning pass.
    pub items_to_prune: usize,
    /// Capacity of the pending-deletion queue.
    pub delete_buffer: usize,
    /// Capacity of the pending-promotion queue.
    pub promote_buffer: usize,
    /// Reads an entry needs before it is moved to the front again.
    pub gets_per_promote: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            buckets: DEFAULT_BUCKETS,
            items_to_prune: DEFAULT_ITEMS_TO_PRUNE,
            delete_buffer: DEFAULT_DELETE_BUFFER,
            promote_buffer: DEFAULT_PROMOTE_BUFFER,
            gets_per_promote: DEFAULT_GETS_PER_PROMOTE,
        }
    }
}

impl StoreConfig {
    pub fn max_size(mut self, max_size: i64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn buckets(mut self, bits: u32) -> Self {
        self.buckets = bits;
        self
    }

    pub fn items_to_prune(mut self, count: usize) -> Self {
        self.items_to_prune = count;
        self
    }

    pub fn delete_buffer(mut self, capacity: usize) -> Self {
        self.delete_buffer = capacity;
        self
    }

    pub fn promote_buffer(mut self, capacity: usize) -> Self {
        self.promote_buffer = capacity;
        self
    }

    pub fn gets_per_promote(mut self, gets: u32) -> Self {
        self.gets_per_promote = gets;
        self
    }

    /// Number of shards, `2^buckets`, with the exponent capped at 16.
    pub fn bucket_count(&self) -> usize {
        1 << self.buckets.min(MAX_BUCKET_BITS)
    }

    /// Returns `items_to_prune`, clamping to 1 if zero.
    pub fn items_to_prune_non_zero(&self) -> usize {
        self.items_to_prune.max(1)
    }

    /// Returns `gets_per_promote`, clamping to 1 if zero.
    pub fn gets_per_promote_non_zero(&self) -> u32 {
        self.gets_per_promote.max(1)
    }
}
