//! Content hashing for change detection.
//!
//! A tracked record stores the hash of the content draft last written to its
//! content item. Comparing hashes decides whether an update is needed without
//! comparing every rendered field.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute a SHA256 hash of a serializable value.
///
/// The value is serialized to JSON first, so struct field order fixes the
/// byte layout and equal values always hash equally.
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check whether freshly rendered content differs from what was stored.
///
/// Returns `true` if there is no stored hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}
