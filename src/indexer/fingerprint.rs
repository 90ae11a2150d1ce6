//! Content fingerprinting for change detection

use sha2::{Digest, Sha256};

/// SHA-256 of the raw bytes as a 64-character lowercase hex digest
///
/// Computed before any text decoding, so identical bytes always give the same hash.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
