//! Change events emitted by the watch cache.
//!
//! A [`ChangeEvent`] is richer than the event a watcher ultimately sees: in
//! addition to the new object it carries the previous object and both
//! attribute sets, so the layers above can evaluate selectors against either
//! side of the transition without recomputing anything.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;

use crate::record::{FieldSet, LabelSet, Record};

/// The kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A record was inserted.
    Added,
    /// An existing record was replaced.
    Modified,
    /// A record was removed.
    Deleted,
    /// Resource-version progress with no record mutation.
    Bookmark,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Bookmark => "BOOKMARK",
        };
        f.write_str(name)
    }
}

/// A single change observed by the cache.
///
/// `resource_version` is strictly monotonically increasing across the events
/// of one cache. `record_time` is the wall-clock instant the event was
/// appended and feeds only the history-capacity tuning.
#[derive(Debug)]
pub struct ChangeEvent<T> {
    /// What happened.
    pub kind: EventType,
    /// Storage key of the affected record; empty for bookmarks.
    pub key: String,
    /// The object after the change; `None` for bookmarks and irrelevant for
    /// deletes beyond selector evaluation.
    pub object: Option<Arc<T>>,
    /// Labels of `object`.
    pub labels: LabelSet,
    /// Fields of `object`.
    pub fields: FieldSet,
    /// The object before the change, when a prior record existed.
    pub prev_object: Option<Arc<T>>,
    /// Labels of `prev_object`.
    pub prev_labels: Option<LabelSet>,
    /// Fields of `prev_object`.
    pub prev_fields: Option<FieldSet>,
    /// Version assigned by the upstream store.
    pub resource_version: u64,
    /// Instant the event entered the cache.
    pub record_time: Instant,
}

impl<T> ChangeEvent<T> {
    /// Build an event for `kind` from the materialized record, stamped with
    /// the given resource version.
    pub fn from_record(kind: EventType, record: &Record<T>, resource_version: u64) -> Self {
        Self {
            kind,
            key: record.key().to_string(),
            object: Some(Arc::clone(record.object())),
            labels: record.labels().clone(),
            fields: record.fields().clone(),
            prev_object: None,
            prev_labels: None,
            prev_fields: None,
            resource_version,
            record_time: Instant::now(),
        }
    }

    /// Attach the previous record to a Modified or Deleted event.
    pub fn with_previous(mut self, previous: &Record<T>) -> Self {
        self.prev_object = Some(Arc::clone(previous.object()));
        self.prev_labels = Some(previous.labels().clone());
        self.prev_fields = Some(previous.fields().clone());
        self
    }

    /// A bookmark: advertises resource-version progress without carrying an
    /// object.
    pub fn bookmark(resource_version: u64) -> Self {
        Self {
            kind: EventType::Bookmark,
            key: String::new(),
            object: None,
            labels: LabelSet::new(),
            fields: FieldSet::new(),
            prev_object: None,
            prev_labels: None,
            prev_fields: None,
            resource_version,
            record_time: Instant::now(),
        }
    }
}

// Manual impl: payloads are `Arc`-shared, `T: Clone` is not required.
impl<T> Clone for ChangeEvent<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            key: self.key.clone(),
            object: self.object.clone(),
            labels: self.labels.clone(),
            fields: self.fields.clone(),
            prev_object: self.prev_object.clone(),
            prev_labels: self.prev_labels.clone(),
            prev_fields: self.prev_fields.clone(),
            resource_version: self.resource_version,
            record_time: self.record_time,
        }
    }
}
