use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::list::SlotId;

const NO_SLOT: usize = usize::MAX;

/// The part of an entry the worker needs: identity, weight and list position.
///
/// `promotions` and `slot` are written by the worker thread only. `removed` is
/// set by whoever takes the entry out of its bucket and is checked by the
/// worker before it (re)links the entry.
pub(crate) struct Link {
    key: String,
    size: i64,
    promotions: AtomicU32,
    slot: AtomicUsize,
    removed: AtomicBool,
}

impl Link {
    fn new(key: String, size: i64) -> Self {
        Self {
            key,
            size,
            promotions: AtomicU32::new(0),
            slot: AtomicUsize::new(NO_SLOT),
            removed: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn size(&self) -> i64 {
        self.size
    }

    pub(crate) fn slot(&self) -> Option<SlotId> {
        match self.slot.load(Ordering::Relaxed) {
            NO_SLOT => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_slot(&self, slot: Option<SlotId>) {
        self.slot.store(slot.unwrap_or(NO_SLOT), Ordering::Relaxed);
    }

    /// Count one promotion request; true once `gets_per_promote` have accrued,
    /// at which point the counter starts over.
    pub(crate) fn should_promote(&self, gets_per_promote: u32) -> bool {
        let promotions = self.promotions.load(Ordering::Relaxed) + 1;
        if promotions >= gets_per_promote {
            self.promotions.store(0, Ordering::Relaxed);
            true
        } else {
            self.promotions.store(promotions, Ordering::Relaxed);
            false
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

/// A bucket-owned cache entry.
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    expires_at: Option<Instant>,
    pub(crate) link: Arc<Link>,
}

impl<V> Entry<V> {
    pub(crate) fn new(key: String, value: V, size: i64, ttl: Duration) -> Self {
        // an unrepresentable deadline never expires
        Self::with_deadline(key, value, size, Instant::now().checked_add(ttl))
    }

    pub(crate) fn with_deadline(
        key: String,
        value: V,
        size: i64,
        expires_at: Option<Instant>,
    ) -> Self {
        Self {
            value,
            expires_at,
            link: Arc::new(Link::new(key, size)),
        }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.expires_at
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.expires_at {
            Some(deadline) if deadline > now => Some(deadline - now),
            Some(_) => Some(Duration::ZERO),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_every_nth_request() {
        let link = Link::new("k".into(), 1);
        assert!(!link.should_promote(3));
        assert!(!link.should_promote(3));
        assert!(link.should_promote(3));
        assert!(!link.should_promote(3));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let entry = Entry::new("k".into(), 1_u8, 1, Duration::ZERO);
        assert!(entry.is_expired(Instant::now()));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let entry = Entry::new("k".into(), 1_u8, 1, Duration::MAX);
        assert!(!entry.is_expired(Instant::now()));
        assert_eq!(entry.remaining(Instant::now()), None);
    }

    #[test]
    fn slot_round_trips_through_sentinel() {
        let link = Link::new("k".into(), 1);
        assert_eq!(link.slot(), None);
        link.set_slot(Some(7));
        assert_eq!(link.slot(), Some(7));
        link.set_slot(None);
        assert_eq!(link.slot(), None);
    }
}
