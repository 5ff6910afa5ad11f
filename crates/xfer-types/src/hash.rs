//! The `Hash` newtype: a validated, lowercase-hex artifact name.
//!
//! A hash is either 40 hex characters (SHA-1) or 64 hex characters
//! (SHA-3-256). The length alone selects the algorithm — there is no
//! separate algorithm tag on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors produced when parsing a hash token off the wire.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashError {
    /// Token length is neither 40 nor 64.
    #[error("hash has wrong length: {0} (expected 40 or 64)")]
    BadLength(usize),

    /// Token contains a non-hex-digit or uppercase byte.
    #[error("hash is not lowercase hex")]
    BadHex,
}

/// The hash algorithm implied by a hash's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// 40 hex characters.
    Sha1,
    /// 64 hex characters.
    Sha3_256,
}

/// A validated artifact hash: 40 or 64 lowercase hex characters.
///
/// Constructed only through [`Hash::parse`], so any `Hash` in scope is
/// known-valid — callers never re-check length or hex-ness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    /// Parse and validate a hash token.
    pub fn parse(token: &str) -> Result<Self, HashError> {
        let len = token.len();
        if len != 40 && len != 64 {
            return Err(HashError::BadLength(len));
        }
        if !token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(HashError::BadHex);
        }
        Ok(Self(token.to_string()))
    }

    /// Borrow the lowercase-hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The algorithm implied by this hash's length.
    pub fn algorithm(&self) -> HashAlgorithm {
        match self.0.len() {
            40 => HashAlgorithm::Sha1,
            64 => HashAlgorithm::Sha3_256,
            other => unreachable!("Hash::parse guarantees length 40 or 64, got {other}"),
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Hash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Hash::parse(&value)
    }
}

impl From<Hash> for String {
    fn from(value: Hash) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sha1_length() {
        let h = Hash::parse(&"a".repeat(40)).unwrap();
        assert_eq!(h.algorithm(), HashAlgorithm::Sha1);
    }

    #[test]
    fn accepts_sha3_length() {
        let h = Hash::parse(&"b".repeat(64)).unwrap();
        assert_eq!(h.algorithm(), HashAlgorithm::Sha3_256);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(Hash::parse("abc"), Err(HashError::BadLength(3)));
    }

    #[test]
    fn rejects_uppercase() {
        assert_eq!(Hash::parse(&"A".repeat(40)), Err(HashError::BadHex));
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(Hash::parse(&"g".repeat(40)), Err(HashError::BadHex));
    }

    #[test]
    fn display_round_trips() {
        let token = "a1b2c3d4e5f6".to_string() + &"0".repeat(28);
        let h = Hash::parse(&token).unwrap();
        assert_eq!(h.to_string(), token);
    }
}
