//! Content addressing.
//!
//! Slices, Policies, and call sets are identified by a SHA-256 hash of their
//! canonical planning inputs, mirroring
//! `backtest_v2::data_pipeline::RawPayload::hash`. Hex-encoded for use as a
//! filename component (`<base>/<contentHash>.slice`).

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 content hash.
pub type ContentHash = String;

/// Hash any serializable value by hashing its canonical JSON encoding.
/// Callers are responsible for presenting inputs in a stable order (sorted
/// windows, sorted tuples) before calling this — the hash itself does no
/// reordering, so two semantically-equal-but-differently-ordered inputs will
/// hash differently. That asymmetry is intentional: it is the ordering
/// discipline in §5 that guarantees reproducibility, not the hash function.
pub fn content_hash<T: Serialize>(value: &T) -> ContentHash {
    let canonical =
        serde_json::to_vec(value).expect("content_hash: value must serialize");
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Hash raw bytes directly (used for the materialized slice file itself, to
/// verify round-trip byte-identity per §8 property 8).
pub fn content_hash_bytes(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
