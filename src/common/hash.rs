//! Hashing utilities for minifs
//!
//! Chunks are content-addressed with SHA-256. The identifier is the lower-case
//! hex digest of the chunk's raw bytes, so equal bytes always get the same id
//! regardless of which file or offset they came from.

use sha2::{Digest, Sha256};

/// Length of a chunk identifier in hex characters
pub const CHUNK_ID_LEN: usize = 64;

/// Compute the identifier of a chunk
pub fn chunk_id(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check that `data` hashes to `expected`
pub fn verify_chunk(data: &[u8], expected: &str) -> crate::Result<()> {
    let actual = chunk_id(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(crate::Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Is this a well-formed chunk identifier?
pub fn is_chunk_id(s: &str) -> bool {
    s.len() == CHUNK_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
