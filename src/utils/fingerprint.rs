//! Stable fingerprints for urls and paths
//!
//! Channel ids and media source ids must survive restarts and cache reloads,
//! so they are derived from a cryptographic hash rather than `DefaultHasher`,
//! whose output is not guaranteed to be stable across releases.

use sha2::{Digest, Sha256};

/// 32 hex characters derived from SHA-256 of `input`
pub fn fingerprint(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_distinct() {
        let a = fingerprint("http://host/playlist.m3u");
        assert_eq!(a, fingerprint("http://host/playlist.m3u"));
        assert_ne!(a, fingerprint("http://host/other.m3u"));
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
