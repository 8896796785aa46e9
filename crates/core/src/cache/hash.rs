//! Search cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a search.
///
/// Queries are trimmed and lowercased first, so `"Roma "` and `"roma"` share
/// a row.
pub fn compute_search_key(mode: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mode.as_bytes());
    hasher.update(b"\n");
    hasher.update(query.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
