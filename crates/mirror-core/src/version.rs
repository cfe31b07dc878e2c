//! Resource-version parsing and extraction.
//!
//! The cache never generates resource versions. It inherits them from the
//! upstream store through a [`Versioner`]: one side parses the version string
//! a client sent, the other extracts the version stamped on an ingested
//! object.

use crate::error::MirrorError;
use crate::Result;

/// Parses client-provided resource-version strings and extracts versions
/// from ingested objects.
///
/// Implementations must be pure: the same input always yields the same
/// version, and no call may touch the cache that invoked it.
pub trait Versioner<T>: Send + Sync {
    /// Parse a resource-version string from a client request.
    ///
    /// An empty string means "no version constraint" and parses to 0.
    fn parse_resource_version(&self, raw: &str) -> Result<u64>;

    /// Extract the resource version the upstream store stamped on `object`.
    fn object_resource_version(&self, object: &T) -> Result<u64>;
}

/// Parse a plain decimal resource-version string.
///
/// The empty string parses to 0. Implementations of [`Versioner`] whose
/// upstream encodes versions as decimal integers can delegate here.
pub fn parse_resource_version(raw: &str) -> Result<u64> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>().map_err(|err| MirrorError::BadInput {
        reason: format!("invalid resource version {raw:?}: {err}"),
    })
}
