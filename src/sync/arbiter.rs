//! Keyed mutual exclusion.
//!
//! The arbiter hands out one latch per contended key. Latches are created on
//! the first `lock` and dropped again once the last holder or waiter has
//! called `unlock`, so the registry only ever holds keys that are in use.
//!
//! This is a plain advisory lock: it is not reentrant, has no timeout and does
//! no deadlock detection. Locking the same key twice from one thread blocks
//! forever.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use once_cell::sync::Lazy;
use tracing::warn;

use super::lock::{condvar_wait, mutex_lock};

const SOURCE: &str = "sync::arbiter";

static GLOBAL: Lazy<Arc<Arbiter>> = Lazy::new(|| Arc::new(Arbiter::new()));

#[derive(Default)]
struct Latch {
    held: Mutex<bool>,
    released: Condvar,
}

impl Latch {
    fn acquire(&self) {
        let mut held = mutex_lock(&self.held, SOURCE, "latch.acquire");
        while *held {
            held = condvar_wait(&self.released, held, SOURCE, "latch.acquire");
        }
        *held = true;
    }

    fn release(&self) {
        *mutex_lock(&self.held, SOURCE, "latch.release") = false;
        self.released.notify_one();
    }
}

struct Slot {
    latch: Arc<Latch>,
    // holders plus waiters; only touched under the registry lock
    usage: usize,
}

/// Registry of named latches.
pub struct Arbiter {
    latches: Mutex<HashMap<String, Slot>>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            latches: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide arbiter shared by every cacher that does not bring its own.
    pub fn global() -> Arc<Arbiter> {
        Arc::clone(&GLOBAL)
    }

    /// Block until `key` is exclusively held by the caller.
    pub fn lock(&self, key: &str) {
        let latch = {
            let mut latches = mutex_lock(&self.latches, SOURCE, "lock");
            let slot = latches.entry(key.to_owned()).or_insert_with(|| Slot {
                latch: Arc::new(Latch::default()),
                usage: 0,
            });
            slot.usage += 1;
            Arc::clone(&slot.latch)
        };
        latch.acquire();
    }

    /// Release `key`.
    ///
    /// The usage count is decremented and the latch unregistered before the
    /// latch itself is released.
    pub fn unlock(&self, key: &str) {
        let latch = {
            let mut latches = mutex_lock(&self.latches, SOURCE, "unlock");
            let Some(slot) = latches.get_mut(key) else {
                warn!(key, "Unlock of a key that is not locked ignored");
                return;
            };
            slot.usage -= 1;
            let latch = Arc::clone(&slot.latch);
            if slot.usage == 0 {
                latches.remove(key);
            }
            latch
        };
        latch.release();
    }

    /// Lock `key` for the lifetime of the returned guard.
    pub fn guard(&self, key: &str) -> ArbiterGuard<'_> {
        self.lock(key);
        ArbiterGuard {
            arbiter: self,
            key: key.to_owned(),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        mutex_lock(&self.latches, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its key on drop.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct ArbiterGuard<'a> {
    arbiter: &'a Arbiter,
    key: String,
}

impl ArbiterGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ArbiterGuard<'_> {
    fn drop(&mut self) {
        self.arbiter.unlock(&self.key);
    }
}
