//! SHA-256 helpers.
//!
//! Block content hashes and public-key fingerprints are all SHA-256. One
//! digest length everywhere keeps comparisons and hex rendering uniform.

use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest identifying a block's content.
pub type BlockHash = [u8; 32];

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First eight hex characters of a digest, for logs and display.
pub fn short_hex(digest: &[u8]) -> String {
    let full = hex::encode(digest);
    full.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(sha256(b"civitas"), sha256(b"civitas"));
        assert_ne!(sha256(b"civitas"), sha256(b"civitas!"));
    }

    #[test]
    fn known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn short_hex_is_eight_chars() {
        assert_eq!(short_hex(&sha256(b"x")).len(), 8);
    }
}
