//! # watchmirror
//!
//! In-memory, ordered, resource-version-indexed mirror of a
//! strongly-consistent key-value store.
//!
//! watchmirror sits between a single upstream ingestor (a reflector doing a
//! full list followed by a continuous watch) and many concurrent readers,
//! and serves get, list, and watch-bootstrap operations without
//! round-tripping to the backend:
//!
//! - Freshness-gated reads: "give me a view at least as fresh as version R"
//! - Paginated lists served from copy-on-write snapshots, with opaque
//!   continue tokens
//! - "Events since R" replay for watchers joining mid-stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use watchmirror::prelude::*;
//!
//! let cache = WatchCache::builder()
//!     .key_func(|pod: &Pod| Ok(format!("/pods/{}/{}", pod.namespace, pod.name)))
//!     .attrs_func(|pod: &Pod| Ok((pod.labels.clone(), pod.fields.clone())))
//!     .versioner(PodVersioner)
//!     .event_handler(|event| broadcaster.dispatch(event))
//!     .build()?;
//!
//! // The reflector seeds and then drives the cache...
//! cache.replace(initial_pods, "1000")?;
//! cache.add(new_pod)?;
//!
//! // ...while readers serve from it.
//! let list = cache
//!     .wait_until_fresh_and_list(1000, "/pods/", &ListOptions::default())
//!     .await?;
//! ```
//!
//! ## Architecture
//!
//! This library is organized into two crates:
//!
//! - `mirror-core` - Record/event types, the versioner seam, and the error
//!   taxonomy
//! - `mirror-cache` - The ordered store, event history, and cache
//!   orchestrator
//!
//! This crate (`watchmirror`) re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **One writer, many readers** - Mutators are sequential; readers never
//!    block the ingestor for longer than a snapshot clone
//! 3. **Opaque payloads** - Key, attribute, and version extraction are
//!    injected at construction
//! 4. **Observable** - Atomic statistics and tracing instrumentation
//!    throughout

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export all sub-crates
pub use mirror_cache as cache;
pub use mirror_core as core;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use watchmirror::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use mirror_core::{
        parse_resource_version, ChangeEvent, EventType, FieldSet, LabelSet, MirrorError, Record,
        Result, Versioner,
    };

    // Cache types
    pub use mirror_cache::{
        decode_continue, encode_continue, CacheStats, EventInterval, ListOptions, ListResult,
        OrderedStore, StoreSnapshot, WatchCache, WatchCacheBuilder,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("watchmirror {} (MSRV {})", VERSION, MSRV)
    }
}
