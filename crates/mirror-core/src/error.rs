//! Error types for watch cache operations.
//!
//! This module provides [`MirrorError`], the error type surfaced at the cache
//! boundary. Every failure a caller can observe maps to one of its variants;
//! library code never panics.

/// Error type for watch cache operations.
///
/// The variants mirror the conditions a client of the cache has to react to:
/// retry after a freshness timeout, relist after an expired window, or fix a
/// malformed request.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The requested resource version is ahead of the cache and the freshness
    /// gate timed out waiting for it.
    ///
    /// Clients should retry after `retry_after_seconds` seconds.
    #[error("timeout: too large resource version: {requested}, current: {current}")]
    TooLargeResourceVersion {
        /// Resource version the reader asked for.
        requested: u64,
        /// Resource version the cache had advanced to when the gate expired.
        current: u64,
        /// Suggested client backoff before retrying.
        retry_after_seconds: u32,
    },

    /// The requested resource version has fallen out of the retained event
    /// window. The client is expected to relist.
    #[error("{0}")]
    ResourceExpired(String),

    /// The request itself is malformed, e.g. an undecodable continue token.
    #[error("{0}")]
    BadRequest(String),

    /// No record exists under the given key.
    #[error("key not found: {key}")]
    NotFound {
        /// Key that missed.
        key: String,
    },

    /// The caller handed the cache an unusable argument.
    #[error("bad input: {reason}")]
    BadInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// No index is registered under the given name.
    #[error("index with name {name} does not exist")]
    UnknownIndex {
        /// The unregistered index name.
        name: String,
    },

    /// The cache has neither replayed an initial list nor buffered any event.
    #[error("watch cache isn't correctly initialized")]
    Uninitialized,

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl MirrorError {
    /// Seconds a client should wait before retrying after a freshness
    /// timeout.
    pub const RETRY_AFTER_SECONDS: u32 = 1;

    /// Freshness-gate timeout for `requested` while the cache sits at
    /// `current`.
    pub fn too_large(requested: u64, current: u64) -> Self {
        Self::TooLargeResourceVersion {
            requested,
            current,
            retry_after_seconds: Self::RETRY_AFTER_SECONDS,
        }
    }

    /// Expired-window error for a resource version the cache no longer
    /// retains.
    pub fn too_old(requested: u64) -> Self {
        Self::ResourceExpired(format!("too old resource version: {requested}"))
    }

    /// Expired-window error that also reports the oldest version still
    /// deliverable.
    pub fn too_old_with_oldest(requested: u64, oldest: u64) -> Self {
        Self::ResourceExpired(format!(
            "too old resource version: {requested} ({oldest})"
        ))
    }

    /// Malformed continue token.
    pub fn invalid_continue(reason: impl std::fmt::Display) -> Self {
        Self::BadRequest(format!("continue key is not valid: {reason}"))
    }

    /// Internal error from a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
