//! Retained snapshots backing paginated list continuations.
//!
//! When a limited list starts, the cache clones the store and parks the
//! clone here, keyed by the resource version the list was served at. Every
//! continue request for that resource version then reads the same snapshot,
//! however far the live store has moved on. A snapshot is dropped as soon as
//! its resource version leaves the event history, at which point continue
//! tokens referencing it get `ResourceExpired` and the client relists.

use dashmap::DashMap;
use tracing::trace;

use crate::store::StoreSnapshot;

/// Mapping from resource version to the snapshot a paginated list started
/// from.
///
/// Uses `DashMap` because snapshots are installed under the read side of the
/// cache lock, where multiple list requests may race.
pub struct ContinueCache<T> {
    snapshots: DashMap<u64, StoreSnapshot<T>>,
}

impl<T> ContinueCache<T> {
    /// Create an empty continuation cache.
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    /// Retain `snapshot` for continue requests at `resource_version`.
    pub fn install(&self, resource_version: u64, snapshot: StoreSnapshot<T>) {
        trace!(resource_version, "installed continuation snapshot");
        self.snapshots.insert(resource_version, snapshot);
    }

    /// Snapshot installed at `resource_version`, if still retained.
    pub fn lookup(&self, resource_version: u64) -> Option<StoreSnapshot<T>> {
        self.snapshots
            .get(&resource_version)
            .map(|entry| entry.value().clone())
    }

    /// Drop the snapshot keyed by `resource_version`. Called when that
    /// version's event leaves the ring.
    pub fn evict(&self, resource_version: u64) {
        if self.snapshots.remove(&resource_version).is_some() {
            trace!(resource_version, "evicted continuation snapshot");
        }
    }

    /// Drop every snapshot. Called when a replace resets the event history.
    pub fn clear(&self) {
        self.snapshots.clear();
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshots are retained.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl<T> Default for ContinueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
