//! Stored records and their precomputed attributes.
//!
//! Computing the storage key, labels, and fields of an object is generally
//! non-trivial. To avoid recomputing them for every list or watch request,
//! the cache stores [`Record`]s: the payload together with its key and
//! attribute sets, materialized once at ingest time.

use std::collections::HashMap;
use std::sync::Arc;

/// Label attributes of a record, as `name -> value` pairs.
pub type LabelSet = HashMap<String, String>;

/// Field attributes of a record, as `path -> value` pairs.
pub type FieldSet = HashMap<String, String>;

/// A stored entity: an opaque payload plus its key and precomputed
/// attributes.
///
/// Records are value-like. An update replaces the record wholesale; nothing
/// mutates a record in place once it entered the store. Payloads are shared
/// via `Arc`, so cloning a record never copies the object itself.
#[derive(Debug)]
pub struct Record<T> {
    key: String,
    object: Arc<T>,
    labels: LabelSet,
    fields: FieldSet,
}

impl<T> Record<T> {
    /// Create a record from a key, payload, and precomputed attributes.
    pub fn new(
        key: impl Into<String>,
        object: Arc<T>,
        labels: LabelSet,
        fields: FieldSet,
    ) -> Self {
        Self {
            key: key.into(),
            object,
            labels,
            fields,
        }
    }

    /// The record's globally unique storage key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The opaque payload.
    #[inline]
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Precomputed label attributes.
    #[inline]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Precomputed field attributes.
    #[inline]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

// Manual impl: `Arc<T>` clones without requiring `T: Clone`.
impl<T> Clone for Record<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            object: Arc::clone(&self.object),
            labels: self.labels.clone(),
            fields: self.fields.clone(),
        }
    }
}
