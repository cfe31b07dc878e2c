//! Opaque pagination tokens for limited lists.
//!
//! A continue token is the base64-url (no padding) encoding of a small JSON
//! object carrying the API version of the token format, the resource version
//! the list snapshot was taken at, and the key to resume from. The start key
//! is canonicalized on decode and re-anchored under the caller's key prefix,
//! so a crafted token can never range outside the prefix it was issued for.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mirror_core::{MirrorError, Result};
use serde::{Deserialize, Serialize};

/// The only recognized continue-token format version.
pub const CONTINUE_API_VERSION: &str = "meta.k8s.io/v1";

#[derive(Debug, Serialize, Deserialize)]
struct ContinueToken {
    #[serde(rename = "v")]
    api_version: String,
    #[serde(rename = "rv")]
    resource_version: i64,
    #[serde(rename = "start")]
    start_key: String,
}

/// Encode a continue token resuming at `start_key` against the snapshot
/// taken at `resource_version`.
///
/// `start_key` is relative to the list's key prefix, conventionally the
/// last returned key followed by `\0` (the smallest key strictly after it).
pub fn encode_continue(resource_version: i64, start_key: &str) -> Result<String> {
    if resource_version <= 0 {
        return Err(MirrorError::BadInput {
            reason: format!("continue resource version must be positive, got {resource_version}"),
        });
    }
    if start_key.is_empty() {
        return Err(MirrorError::BadInput {
            reason: "continue start key must not be empty".to_string(),
        });
    }
    let token = ContinueToken {
        api_version: CONTINUE_API_VERSION.to_string(),
        resource_version,
        start_key: start_key.to_string(),
    };
    let json = serde_json::to_vec(&token)
        .map_err(|err| MirrorError::internal(format!("encoding continue token: {err}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a continue token against `key_prefix`.
///
/// Returns the fully qualified key to resume the range from, together with
/// the resource version of the snapshot the token references. The embedded
/// start key is canonicalized (`/`-anchored, `.`/`..`/`//` reduced) and
/// rejected if canonicalization changed it, defending against clients
/// crafting tokens that escape `key_prefix`.
pub fn decode_continue(token: &str, key_prefix: &str) -> Result<(String, i64)> {
    let parsed = parse_token(token)?;
    if parsed.api_version != CONTINUE_API_VERSION {
        return Err(unrecognized_version(&parsed.api_version));
    }
    if parsed.resource_version == 0 {
        return Err(MirrorError::invalid_continue(format!(
            "incorrect encoded start resourceVersion (version {CONTINUE_API_VERSION})"
        )));
    }
    if parsed.start_key.is_empty() {
        return Err(MirrorError::invalid_continue(format!(
            "encoded start key empty (version {CONTINUE_API_VERSION})"
        )));
    }

    let mut key = parsed.start_key.clone();
    if !key.starts_with('/') {
        key.insert(0, '/');
    }
    let cleaned = clean_path(&key);
    if cleaned != key {
        return Err(MirrorError::invalid_continue(&parsed.start_key));
    }
    Ok((
        format!("{key_prefix}{}", &cleaned[1..]),
        parsed.resource_version,
    ))
}

/// Decode only the resource version out of a continue token.
///
/// Callers use this to decide whether the snapshot a continuation references
/// is still retained, before committing to serve the request.
pub fn resource_version_from_token(token: &str) -> Result<u64> {
    let parsed = parse_token(token)?;
    if parsed.api_version != CONTINUE_API_VERSION {
        return Err(unrecognized_version(&parsed.api_version));
    }
    if parsed.resource_version <= 0 {
        return Err(MirrorError::invalid_continue(format!(
            "incorrect encoded start resourceVersion (version {CONTINUE_API_VERSION})"
        )));
    }
    Ok(parsed.resource_version as u64)
}

fn parse_token(token: &str) -> Result<ContinueToken> {
    let data = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(MirrorError::invalid_continue)?;
    serde_json::from_slice(&data).map_err(MirrorError::invalid_continue)
}

fn unrecognized_version(version: &str) -> MirrorError {
    MirrorError::invalid_continue(format!(
        "server does not recognize this encoded version {version:?}"
    ))
}

/// Lexically canonicalize a path: collapse repeated slashes, resolve `.`
/// and `..` segments, strip trailing slashes. Rooted paths never escape
/// the root.
fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                match segments.last() {
                    Some(&last) if last != ".." => {
                        segments.pop();
                    }
                    _ if rooted => {}
                    _ => segments.push(".."),
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
