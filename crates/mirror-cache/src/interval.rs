//! Cursor over a span of historical change events.
//!
//! [`EventInterval`] is what `events_since` hands back: a half-open span of
//! ring positions, plus an optional buffered prefix of synthetic events for
//! replays of the current state. The cursor revalidates its position against
//! the ring on every step; once the window slides past it, consumption fails
//! and the subscriber must relist.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock};

use mirror_core::{ChangeEvent, MirrorError, Result};

use crate::cache::CacheState;

/// A consumable span of historical events, oldest first.
///
/// The cache guarantees only that while the span's positions remain inside
/// the live ring window, each position yields the expected event. Appends
/// that overwrite a not-yet-consumed position invalidate the interval.
pub struct EventInterval<T> {
    source: Option<Arc<RwLock<CacheState<T>>>>,
    buffer: VecDeque<Arc<ChangeEvent<T>>>,
    position: u64,
    end: u64,
}

impl<T> fmt::Debug for EventInterval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInterval")
            .field("position", &self.position)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl<T> EventInterval<T> {
    /// Interval over pre-materialized events only, with no ring tail. Used
    /// to replay the current store content as synthetic additions.
    pub(crate) fn from_buffer(events: Vec<Arc<ChangeEvent<T>>>) -> Self {
        Self {
            source: None,
            buffer: events.into(),
            position: 0,
            end: 0,
        }
    }

    /// Interval over ring positions `[start, end)`.
    pub(crate) fn over_ring(
        state: Arc<RwLock<CacheState<T>>>,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            source: Some(state),
            buffer: VecDeque::new(),
            position: start,
            end,
        }
    }

    /// Events left to consume, assuming no invalidation.
    pub fn remaining(&self) -> usize {
        self.buffer.len() + (self.end.saturating_sub(self.position)) as usize
    }

    /// The next event, `None` once the span is exhausted.
    ///
    /// Fails with [`MirrorError::ResourceExpired`] if the ring overwrote a
    /// position this cursor had not consumed yet.
    pub fn next(&mut self) -> Result<Option<Arc<ChangeEvent<T>>>> {
        if let Some(event) = self.buffer.pop_front() {
            return Ok(Some(event));
        }
        if self.position >= self.end {
            return Ok(None);
        }
        let source = match &self.source {
            Some(source) => source,
            None => return Ok(None),
        };
        let state = source.read().expect("watch cache lock poisoned");
        if !state.ring.is_valid_position(self.position) {
            return Err(MirrorError::ResourceExpired(
                "watch cache event interval was invalidated".to_string(),
            ));
        }
        let event = state.ring.get(self.position).map(Arc::clone);
        self.position += 1;
        Ok(event)
    }

    /// Drain the rest of the span into a vector.
    pub fn collect_remaining(&mut self) -> Result<Vec<Arc<ChangeEvent<T>>>> {
        let mut events = Vec::with_capacity(self.remaining());
        while let Some(event) = self.next()? {
            events.push(event);
        }
        Ok(events)
    }
}
