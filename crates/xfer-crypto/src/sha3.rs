//! SHA-3-256 digests (64-hex-char hashes, negotiated peer version ≥ 20000).

use sha3::{Digest, Sha3_256};

/// Lowercase hex SHA-3-256 digest of `data`.
pub fn hex(data: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_has_64_hex_chars() {
        assert_eq!(hex(b"hello").len(), 64);
    }

    #[test]
    fn differs_from_sha1() {
        assert_ne!(hex(b"hello"), crate::sha1::hex(b"hello"));
    }
}
