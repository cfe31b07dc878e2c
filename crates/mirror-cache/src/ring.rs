//! Bounded circular history of change events.
//!
//! The ring holds the most recent events in resource-version order. Its
//! capacity adapts to event-arrival density: a full window that is still
//! entirely fresh doubles, a window whose recent quarter has already gone
//! stale halves. `start_index` and `end_index` are monotone counters; the
//! live window is `[start_index, end_index)` and a counter maps to a
//! physical slot by `counter % capacity`.

use std::sync::Arc;

use mirror_core::ChangeEvent;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// How long appended events are considered fresh for capacity tuning.
pub const EVENT_FRESH_DURATION: Duration = Duration::from_secs(75);

/// Default lower bound of the dynamic capacity, and the initial capacity.
pub const DEFAULT_LOWER_BOUND_CAPACITY: usize = 100;

/// Default upper bound of the dynamic capacity.
pub const DEFAULT_UPPER_BOUND_CAPACITY: usize = 100 * 1024;

/// Circular buffer of change events with dynamic capacity.
///
/// Appending to a full ring overwrites the oldest event; the resource
/// versions of everything evicted are reported back so the owner can drop
/// state keyed by them (continuation snapshots).
pub struct EventRing<T> {
    buffer: Vec<Option<Arc<ChangeEvent<T>>>>,
    capacity: usize,
    lower_bound: usize,
    upper_bound: usize,
    start_index: u64,
    end_index: u64,
}

impl<T> EventRing<T> {
    /// Create an empty ring at the default capacity bounds.
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_LOWER_BOUND_CAPACITY, DEFAULT_UPPER_BOUND_CAPACITY)
    }

    /// Create an empty ring with custom capacity bounds. The initial
    /// capacity is `lower_bound`.
    pub fn with_bounds(lower_bound: usize, upper_bound: usize) -> Self {
        Self {
            buffer: vec![None; lower_bound],
            capacity: lower_bound,
            lower_bound,
            upper_bound,
            start_index: 0,
            end_index: 0,
        }
    }

    /// Number of live events.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end_index - self.start_index) as usize
    }

    /// Whether the ring holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }

    /// Current capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Position of the oldest live event.
    #[inline]
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    /// Position one past the newest live event.
    #[inline]
    pub fn end_index(&self) -> u64 {
        self.end_index
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.end_index == self.start_index + self.capacity as u64
    }

    #[inline]
    fn slot(&self, position: u64) -> usize {
        (position % self.capacity as u64) as usize
    }

    /// Event at an absolute position, if the position is still inside the
    /// live window.
    pub fn get(&self, position: u64) -> Option<&Arc<ChangeEvent<T>>> {
        if position < self.start_index || position >= self.end_index {
            return None;
        }
        self.buffer[self.slot(position)].as_ref()
    }

    /// Whether a previously obtained position still addresses a live event.
    #[inline]
    pub fn is_valid_position(&self, position: u64) -> bool {
        position >= self.start_index && position < self.end_index
    }

    /// Resource version of the oldest live event.
    pub fn oldest_resource_version(&self) -> Option<u64> {
        self.get(self.start_index).map(|event| event.resource_version)
    }

    /// Append an event, growing or shrinking the ring per the freshness
    /// policy first.
    ///
    /// Returns the resource versions of every event evicted by the append,
    /// oldest first.
    pub fn append(&mut self, event: Arc<ChangeEvent<T>>) -> Vec<u64> {
        let mut evicted = Vec::new();
        if self.is_full() {
            let target = self.next_capacity(event.record_time);
            // The oldest slot is about to be overwritten (or truncated away
            // by a shrink); it leaves through the eviction path either way.
            if let Some(oldest) = self.get(self.start_index) {
                evicted.push(oldest.resource_version);
            }
            let slot = self.slot(self.start_index);
            self.buffer[slot] = None;
            self.start_index += 1;
            if let Some(capacity) = target {
                self.remap(capacity, &mut evicted);
            }
            // A shrink truncates to exactly the new capacity; make room for
            // the incoming event.
            if self.is_full() {
                if let Some(oldest) = self.get(self.start_index) {
                    evicted.push(oldest.resource_version);
                }
                let slot = self.slot(self.start_index);
                self.buffer[slot] = None;
                self.start_index += 1;
            }
        }
        let slot = self.slot(self.end_index);
        self.buffer[slot] = Some(event);
        self.end_index += 1;
        evicted
    }

    /// Decide the next capacity for a full ring, if it should change.
    ///
    /// - Grow when even the oldest retained event is still within
    ///   [`EVENT_FRESH_DURATION`] of the incoming one: history is filling
    ///   faster than it ages out.
    /// - Shrink when the event a quarter-window back is already older than
    ///   the freshness window: activity is slow and the tail is dead weight.
    fn next_capacity(&self, event_time: Instant) -> Option<usize> {
        let oldest_time = self.get(self.start_index)?.record_time;
        if event_time.duration_since(oldest_time) < EVENT_FRESH_DURATION {
            let capacity = (self.capacity * 2).min(self.upper_bound);
            return (capacity > self.capacity).then_some(capacity);
        }
        let quarter = self.end_index - (self.capacity / 4) as u64;
        let quarter_time = self.get(quarter)?.record_time;
        if event_time.duration_since(quarter_time) > EVENT_FRESH_DURATION {
            let capacity = (self.capacity / 2).max(self.lower_bound);
            return (capacity < self.capacity).then_some(capacity);
        }
        None
    }

    /// Reallocate the backing buffer at `new_capacity` and re-map every live
    /// event into its new slot. Shrinking truncates the window to the newest
    /// `new_capacity` events, reporting the truncated ones in `evicted`.
    fn remap(&mut self, new_capacity: usize, evicted: &mut Vec<u64>) {
        if new_capacity < self.capacity {
            let new_start = self.end_index.saturating_sub(new_capacity as u64);
            while self.start_index < new_start {
                if let Some(event) = self.get(self.start_index) {
                    evicted.push(event.resource_version);
                }
                let slot = self.slot(self.start_index);
                self.buffer[slot] = None;
                self.start_index += 1;
            }
        }
        let mut buffer: Vec<Option<Arc<ChangeEvent<T>>>> = vec![None; new_capacity];
        for position in self.start_index..self.end_index {
            let slot = self.slot(position);
            buffer[(position % new_capacity as u64) as usize] = self.buffer[slot].take();
        }
        debug!(
            old_capacity = self.capacity,
            new_capacity, "resized event ring"
        );
        self.buffer = buffer;
        self.capacity = new_capacity;
    }

    /// Drop every event and reset the window to `[0, 0)`. Capacity is
    /// retained.
    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.start_index = 0;
        self.end_index = 0;
    }

    /// Absolute position of the first live event with a resource version
    /// strictly greater than `resource_version`; `end_index` if there is
    /// none. Binary search over the (sorted) live window.
    pub fn first_position_after(&self, resource_version: u64) -> u64 {
        let mut lo = 0u64;
        let mut hi = self.end_index - self.start_index;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(self.start_index + mid) {
                Some(event) if event.resource_version > resource_version => hi = mid,
                Some(_) => lo = mid + 1,
                // Positions inside the live window are always populated.
                None => hi = mid,
            }
        }
        self.start_index + lo
    }

    /// Whether an event with exactly this resource version is live.
    pub fn contains_resource_version(&self, resource_version: u64) -> bool {
        if resource_version == 0 {
            return false;
        }
        let candidate = self.first_position_after(resource_version - 1);
        self.get(candidate)
            .is_some_and(|event| event.resource_version == resource_version)
    }
}

impl<T> Default for EventRing<T> {
    fn default() -> Self {
        Self::new()
    }
}
