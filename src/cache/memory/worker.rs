//! The store's single background worker.
//!
//! The worker is the only owner of the recency list and the size total, which
//! is what lets readers and writers touch nothing but their own bucket's lock.
//! It multiplexes three queues: promotions, deletions and control requests.
//! Dropping every control sender stops it after pending deletions are applied.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, select};
use metrics::{counter, gauge};
use tracing::debug;

use crate::cache::config::StoreConfig;
use crate::cache::value::CacheValue;

use super::bucket::Buckets;
use super::entry::Link;
use super::list::RecencyList;

const METRIC_STORE_EVICT: &str = "tagcache_store_evict_total";
const METRIC_STORE_SIZE: &str = "tagcache_store_size";

pub(crate) enum Control {
    /// Empty every bucket and reset the list and size.
    Clear(Sender<()>),
    /// Apply everything queued so far, then reply.
    Sync(Sender<()>),
    /// Run one pruning pass regardless of size.
    Gc(Sender<()>),
    /// Reply with the eviction count since the last request and reset it.
    Dropped(Sender<usize>),
    /// Reply with the tracked size total.
    Size(Sender<i64>),
}

pub(crate) struct Worker<V> {
    buckets: Arc<Buckets<V>>,
    list: RecencyList<Arc<Link>>,
    size: i64,
    dropped: usize,
    max_size: i64,
    items_to_prune: usize,
    gets_per_promote: u32,
    promotables: Receiver<Arc<Link>>,
    deletables: Receiver<Arc<Link>>,
    control: Receiver<Control>,
}

impl<V: CacheValue> Worker<V> {
    pub(crate) fn new(
        buckets: Arc<Buckets<V>>,
        config: &StoreConfig,
        promotables: Receiver<Arc<Link>>,
        deletables: Receiver<Arc<Link>>,
        control: Receiver<Control>,
    ) -> Self {
        Self {
            buckets,
            list: RecencyList::new(),
            size: 0,
            dropped: 0,
            max_size: config.max_size,
            items_to_prune: config.items_to_prune_non_zero(),
            gets_per_promote: config.gets_per_promote_non_zero(),
            promotables,
            deletables,
            control,
        }
    }

    pub(crate) fn run(mut self) {
        debug!("Cache worker started");
        loop {
            select! {
                recv(self.promotables) -> link => match link {
                    Ok(link) => self.on_promote(link),
                    Err(_) => break,
                },
                recv(self.deletables) -> link => match link {
                    Ok(link) => self.unlink(&link),
                    Err(_) => break,
                },
                recv(self.control) -> request => match request {
                    Ok(request) => self.handle(request),
                    Err(_) => break,
                },
            }
        }

        while let Ok(link) = self.deletables.try_recv() {
            self.unlink(&link);
        }
        debug!(
            tracked = self.list.len(),
            size = self.size,
            "Cache worker stopped"
        );
    }

    fn handle(&mut self, request: Control) {
        match request {
            Control::Clear(reply) => {
                for bucket in self.buckets.iter() {
                    bucket.clear();
                }
                self.drain_pending();
                for_each_link(&self.list, |link| link.set_slot(None));
                self.list.clear();
                self.size = 0;
                gauge!(METRIC_STORE_SIZE).set(0.0);
                let _ = reply.send(());
            }
            Control::Sync(reply) => {
                self.drain_pending();
                let _ = reply.send(());
            }
            Control::Gc(reply) => {
                self.gc();
                let _ = reply.send(());
            }
            Control::Dropped(reply) => {
                let _ = reply.send(std::mem::take(&mut self.dropped));
            }
            Control::Size(reply) => {
                let _ = reply.send(self.size);
            }
        }
    }

    /// Apply the messages queued at the time of the call.
    fn drain_pending(&mut self) {
        for _ in 0..self.promotables.len() {
            match self.promotables.try_recv() {
                Ok(link) => self.on_promote(link),
                Err(_) => break,
            }
        }
        self.drain_deletables();
    }

    fn drain_deletables(&mut self) {
        for _ in 0..self.deletables.len() {
            match self.deletables.try_recv() {
                Ok(link) => self.unlink(&link),
                Err(_) => break,
            }
        }
    }

    fn on_promote(&mut self, link: Arc<Link>) {
        if !self.promote(link) || self.size <= self.max_size {
            return;
        }
        // entries displaced before this one was queued no longer count
        self.drain_deletables();
        if self.size > self.max_size {
            self.gc();
        }
    }

    /// Returns true when `link` was new to the list.
    fn promote(&mut self, link: Arc<Link>) -> bool {
        if link.is_removed() {
            return false;
        }
        if let Some(slot) = link.slot() {
            if link.should_promote(self.gets_per_promote) {
                self.list.move_to_front(slot);
            }
            return false;
        }

        self.size += link.size();
        let slot = self.list.push_front(Arc::clone(&link));
        link.set_slot(Some(slot));
        gauge!(METRIC_STORE_SIZE).set(self.size as f64);
        true
    }

    fn unlink(&mut self, link: &Arc<Link>) {
        let Some(slot) = link.slot() else {
            return;
        };
        link.set_slot(None);
        if self
            .list
            .get(slot)
            .is_some_and(|tracked| Arc::ptr_eq(tracked, link))
        {
            self.list.remove(slot);
            self.size -= link.size();
            gauge!(METRIC_STORE_SIZE).set(self.size as f64);
        }
    }

    /// Evict up to `items_to_prune` entries from the back of the list.
    fn gc(&mut self) {
        let mut cursor = self.list.back();
        let mut evicted = 0_usize;
        for _ in 0..self.items_to_prune {
            let Some(slot) = cursor else {
                break;
            };
            cursor = self.list.prev(slot);
            if let Some(link) = self.list.remove(slot) {
                link.set_slot(None);
                self.buckets.bucket(link.key()).evict(&link);
                self.size -= link.size();
                evicted += 1;
            }
        }

        self.dropped += evicted;
        counter!(METRIC_STORE_EVICT).increment(evicted as u64);
        gauge!(METRIC_STORE_SIZE).set(self.size as f64);
        debug!(evicted, size = self.size, "Cache pruned");
    }
}

fn for_each_link(list: &RecencyList<Arc<Link>>, mut f: impl FnMut(&Arc<Link>)) {
    let mut cursor = list.back();
    while let Some(slot) = cursor {
        if let Some(link) = list.get(slot) {
            f(link);
        }
        cursor = list.prev(slot);
    }
}
