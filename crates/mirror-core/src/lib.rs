//! # mirror-core
//!
//! Core types, traits, and error handling for the watchmirror watch cache.
//!
//! This crate provides the foundational types used across the other
//! watchmirror crates:
//!
//! - [`MirrorError`] - Error taxonomy surfaced at the cache boundary
//! - [`Record`] - Stored entity with precomputed label/field attributes
//! - [`ChangeEvent`] / [`EventType`] - Change events with previous-state
//!   attachments
//! - [`Versioner`] - Resource-version parsing and extraction at the
//!   injection seam
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mirror_core::{FieldSet, LabelSet, Record};
//!
//! let record = Record::new(
//!     "/pods/default/api-0",
//!     Arc::new("payload"),
//!     LabelSet::new(),
//!     FieldSet::new(),
//! );
//! assert_eq!(record.key(), "/pods/default/api-0");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod record;
mod version;

pub use error::MirrorError;
pub use event::{ChangeEvent, EventType};
pub use record::{FieldSet, LabelSet, Record};
pub use version::{parse_resource_version, Versioner};

use std::sync::Arc;

/// Result type alias using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Computes the storage key of an ingested object.
///
/// Must be pure and must not call back into the cache.
pub type KeyFunc<T> = Arc<dyn Fn(&T) -> Result<String> + Send + Sync>;

/// Computes the label and field attributes of an ingested object.
///
/// Must be deterministic: index maintenance skips updates when a
/// single-valued index appears unchanged, which is only sound if repeated
/// evaluation of the same object yields the same attributes.
pub type AttrsFunc<T> = Arc<dyn Fn(&T) -> Result<(LabelSet, FieldSet)> + Send + Sync>;

/// Receives every applied change event, in resource-version order, exactly
/// once, outside the cache's locks.
pub type EventHandler<T> = Box<dyn Fn(&ChangeEvent<T>) + Send + Sync>;

/// Invoked after every successful replace of the cache contents.
pub type ReplaceHandler = Box<dyn Fn() + Send + Sync>;
