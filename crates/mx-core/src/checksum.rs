//! SHA-256 checksum utility for definition hashing and cache keys.

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = compute_checksum("select 1");
        let b = compute_checksum("select 1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_differs_on_input() {
        assert_ne!(compute_checksum("a"), compute_checksum("b"));
    }
}
