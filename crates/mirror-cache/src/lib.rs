//! # mirror-cache
//!
//! In-memory, ordered, resource-version-indexed watch cache.
//!
//! This crate provides the caching layer that sits between a single
//! upstream ingestor (a reflector performing list-then-watch against a
//! strongly-consistent key-value store) and many concurrent downstream
//! readers:
//!
//! - [`WatchCache`] - Orchestrator serving freshness-gated gets, lists, and
//!   "events since" queries
//! - [`OrderedStore`] / [`StoreSnapshot`] - Ordered record store with O(1)
//!   structural-sharing snapshots
//! - [`EventRing`] - Bounded circular event history with density-driven
//!   capacity
//! - [`EventInterval`] - Consumable span of historical events
//! - Continue-token codec and [`ContinueCache`] for paginated lists
//!
//! ## Key Design Decisions
//!
//! - One writer, many readers: mutators are called sequentially by the
//!   ingestor; readers coordinate only through a reader-writer lock
//! - Limited lists are served from copy-on-write snapshots, never under the
//!   lock
//! - The freshness gate waits on a resource-version channel bounded by a
//!   3-second timeout, then tells the client to retry
//!
//! ## Example
//!
//! ```rust,ignore
//! use mirror_cache::{ListOptions, WatchCache};
//!
//! let cache = WatchCache::builder()
//!     .key_func(|pod: &Pod| Ok(format!("/pods/{}", pod.name)))
//!     .attrs_func(|pod: &Pod| Ok((pod.labels.clone(), pod.fields.clone())))
//!     .versioner(PodVersioner)
//!     .build()?;
//!
//! cache.replace(initial_pods, "10")?;
//! let list = cache
//!     .wait_until_fresh_and_list(10, "/pods/", &ListOptions::default())
//!     .await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod continue_cache;
mod continue_token;
mod interval;
mod ring;
mod stats;
mod store;

pub use cache::{ListOptions, ListResult, WatchCache, WatchCacheBuilder, BLOCK_TIMEOUT};
pub use continue_cache::ContinueCache;
pub use continue_token::{
    decode_continue, encode_continue, resource_version_from_token, CONTINUE_API_VERSION,
};
pub use interval::EventInterval;
pub use ring::{
    EventRing, DEFAULT_LOWER_BOUND_CAPACITY, DEFAULT_UPPER_BOUND_CAPACITY, EVENT_FRESH_DURATION,
};
pub use stats::CacheStats;
pub use store::{IndexFunc, Indexers, OrderedStore, StoreSnapshot};
