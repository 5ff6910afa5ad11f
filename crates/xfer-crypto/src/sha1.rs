//! SHA-1 digests. Used both as an artifact hash algorithm (40-hex-char
//! hashes) and as the primitive underlying the login challenge.

use sha1::{Digest, Sha1};

/// Lowercase hex SHA-1 digest of `data`.
pub fn hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-1 digest of the concatenation of `parts`, without allocating an
/// intermediate buffer for the whole message.
pub fn hex_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha1("hello") from any reference implementation.
        assert_eq!(hex(b"hello"), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn concat_matches_manual_concatenation() {
        let mut combined = Vec::new();
        combined.extend_from_slice(b"abc");
        combined.extend_from_slice(b"def");
        assert_eq!(hex_concat(&[b"abc", b"def"]), hex(&combined));
    }
}
