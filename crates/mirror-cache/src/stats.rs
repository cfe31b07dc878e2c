//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for watch cache operations.
///
/// All counters are atomic and can be safely read from multiple threads.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Change events applied through the mutators.
    events_applied: AtomicU64,
    /// Bookmarks received via resource-version updates.
    bookmarks_received: AtomicU64,
    /// Full content replaces.
    replaces: AtomicU64,
    /// Events evicted from the ring.
    events_evicted: AtomicU64,
    /// Freshness-gate waits that timed out.
    freshness_timeouts: AtomicU64,
    /// Continuation snapshots installed.
    snapshots_installed: AtomicU64,
    /// Continue requests served from a retained snapshot.
    continue_hits: AtomicU64,
    /// Continue requests whose snapshot had been evicted.
    continue_misses: AtomicU64,
    /// Current ring capacity.
    ring_capacity: AtomicU64,
    /// Ring capacity changes.
    capacity_changes: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied change event.
    #[inline]
    pub fn record_event(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received bookmark.
    #[inline]
    pub fn record_bookmark(&self) {
        self.bookmarks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a content replace.
    #[inline]
    pub fn record_replace(&self) {
        self.replaces.fetch_add(1, Ordering::Relaxed);
    }

    /// Record ring evictions.
    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.events_evicted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a freshness-gate timeout.
    #[inline]
    pub fn record_freshness_timeout(&self) {
        self.freshness_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an installed continuation snapshot.
    #[inline]
    pub fn record_snapshot_installed(&self) {
        self.snapshots_installed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a continue request served from a retained snapshot.
    #[inline]
    pub fn record_continue_hit(&self) {
        self.continue_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a continue request whose snapshot was gone.
    #[inline]
    pub fn record_continue_miss(&self) {
        self.continue_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Track the ring capacity, counting changes.
    #[inline]
    pub fn set_ring_capacity(&self, capacity: u64) {
        let previous = self.ring_capacity.swap(capacity, Ordering::Relaxed);
        if previous != capacity && previous != 0 {
            self.capacity_changes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total change events applied.
    #[inline]
    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    /// Total bookmarks received.
    #[inline]
    pub fn bookmarks_received(&self) -> u64 {
        self.bookmarks_received.load(Ordering::Relaxed)
    }

    /// Total content replaces.
    #[inline]
    pub fn replaces(&self) -> u64 {
        self.replaces.load(Ordering::Relaxed)
    }

    /// Total events evicted from the ring.
    #[inline]
    pub fn events_evicted(&self) -> u64 {
        self.events_evicted.load(Ordering::Relaxed)
    }

    /// Total freshness-gate timeouts.
    #[inline]
    pub fn freshness_timeouts(&self) -> u64 {
        self.freshness_timeouts.load(Ordering::Relaxed)
    }

    /// Total continuation snapshots installed.
    #[inline]
    pub fn snapshots_installed(&self) -> u64 {
        self.snapshots_installed.load(Ordering::Relaxed)
    }

    /// Total continue requests served from a retained snapshot.
    #[inline]
    pub fn continue_hits(&self) -> u64 {
        self.continue_hits.load(Ordering::Relaxed)
    }

    /// Total continue requests whose snapshot was gone.
    #[inline]
    pub fn continue_misses(&self) -> u64 {
        self.continue_misses.load(Ordering::Relaxed)
    }

    /// Current ring capacity.
    #[inline]
    pub fn ring_capacity(&self) -> u64 {
        self.ring_capacity.load(Ordering::Relaxed)
    }

    /// Total ring capacity changes.
    #[inline]
    pub fn capacity_changes(&self) -> u64 {
        self.capacity_changes.load(Ordering::Relaxed)
    }
}
