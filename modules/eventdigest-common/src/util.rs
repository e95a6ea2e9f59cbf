use sha2::{Digest, Sha256};

/// Stable external id for an event: first 16 hex chars of the SHA-256
/// digest of its canonical URL. Identifies "the same event" across runs
/// regardless of content drift.
pub fn external_id(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    digest[..16].to_string()
}

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}
