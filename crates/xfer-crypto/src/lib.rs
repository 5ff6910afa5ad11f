//! # xfer-crypto
//!
//! Hash and signature primitives consumed by the ingest handlers and the
//! login challenge. No algorithm negotiation happens here — the digest
//! length on the wire is the sole algorithm selector.
//!
//! ## Modules
//!
//! - [`sha1`] — SHA-1 hex digests (also the login signature primitive).
//! - [`sha3`] — SHA-3-256 hex digests.
//! - [`login`] — challenge/signature verification for the `login` card.

pub mod login;
pub mod sha1;
pub mod sha3;

use xfer_types::{Hash, HashAlgorithm};

/// Result of verifying content against its announced hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The recomputed digest equals the announced hash.
    Ok,
    /// The recomputed digest does not equal the announced hash.
    Mismatch,
    /// The hash's length did not map to a known algorithm.
    ///
    /// Unreachable through a [`Hash`] obtained via [`Hash::parse`], since
    /// parsing already rejects any length other than 40 or 64. Kept for
    /// API fidelity with callers that verify against a raw digest string.
    UnknownAlgorithm,
}

/// Recompute the hash of `content` and compare it against `hash`. The
/// algorithm is selected by `hash.algorithm()`.
pub fn verify(content: &[u8], hash: &Hash) -> VerifyOutcome {
    let computed = match hash.algorithm() {
        HashAlgorithm::Sha1 => sha1::hex(content),
        HashAlgorithm::Sha3_256 => sha3::hex(content),
    };
    if constant_time_eq(computed.as_bytes(), hash.as_str().as_bytes()) {
        VerifyOutcome::Ok
    } else {
        VerifyOutcome::Mismatch
    }
}

/// Compare two byte strings without early exit on the first mismatching
/// byte. Differing lengths are rejected immediately — length is not
/// secret, only byte content is.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_detects_match_and_mismatch() {
        let content = b"hello";
        let hash = Hash::parse(&sha1::hex(content)).unwrap();
        assert_eq!(verify(content, &hash), VerifyOutcome::Ok);
        assert_eq!(verify(b"world", &hash), VerifyOutcome::Mismatch);
    }

    #[test]
    fn constant_time_eq_rejects_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn constant_time_eq_accepts_equal_strings() {
        assert!(constant_time_eq(b"same", b"same"));
    }
}
