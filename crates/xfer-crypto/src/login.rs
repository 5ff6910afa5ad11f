//! Login challenge verification.
//!
//! A `login LOGIN NONCE SIGNATURE` card seals everything that follows it in
//! the message: `NONCE` must equal `sha1(tail)` where `tail` is the bytes
//! of the message after the login line, and `SIGNATURE` must equal
//! `sha1(NONCE || shared_secret(password))`. Two password encodings are
//! tried against the stored password so that legacy clients (which derive
//! their shared secret by hashing the password with the login name) still
//! authenticate.

use crate::{constant_time_eq, sha1};

/// Two logins that bypass signature verification entirely and receive
/// [`xfer_types::Capabilities::anonymous_defaults`].
pub fn is_anonymous(login: &str) -> bool {
    login == "nobody" || login == "anonymous"
}

/// Verify that `nonce` (the login card's second token) equals
/// `sha1(tail)`, where `tail` is every byte of the message following the
/// login line. This is the seal that makes the login line authenticate
/// the rest of the message, not just itself.
pub fn verify_tail_hash(nonce: &str, tail: &[u8]) -> bool {
    constant_time_eq(sha1::hex(tail).as_bytes(), nonce.as_bytes())
}

/// The two password-derived secret candidates tried against a signature.
///
/// `stored` is the password as the user record holds it. If it is already
/// 40 hex characters it is itself a precomputed legacy shared secret and
/// no second candidate is produced; otherwise the SHA-1-derived form
/// `sha1(stored ++ ":" ++ login)` is tried as a fallback for legacy
/// clients that compute their signature against that derived secret
/// rather than the raw stored password.
fn candidate_secrets(stored: &[u8], login: &str) -> Vec<Vec<u8>> {
    let mut candidates = vec![stored.to_vec()];
    if stored.len() != 40 {
        let mut legacy_input = stored.to_vec();
        legacy_input.push(b':');
        legacy_input.extend_from_slice(login.as_bytes());
        candidates.push(sha1::hex(&legacy_input).into_bytes());
    }
    candidates
}

/// Verify `signature` against `nonce` using the stored password, trying
/// both password encodings in order. Returns `true` on the first
/// candidate that matches.
pub fn verify_signature(nonce: &str, stored_password: &[u8], login: &str, signature: &str) -> bool {
    candidate_secrets(stored_password, login).iter().any(|secret| {
        let recomputed = sha1::hex_concat(&[nonce.as_bytes(), secret]);
        constant_time_eq(recomputed.as_bytes(), signature.as_bytes())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_logins_recognized() {
        assert!(is_anonymous("nobody"));
        assert!(is_anonymous("anonymous"));
        assert!(!is_anonymous("alice"));
    }

    #[test]
    fn tail_hash_round_trips() {
        let tail = b"have a1b2\nfile a1b2 5\nhello\n";
        let nonce = sha1::hex(tail);
        assert!(verify_tail_hash(&nonce, tail));
        assert!(!verify_tail_hash(&nonce, b"different tail"));
    }

    #[test]
    fn stored_password_signature_verifies() {
        let nonce = "0".repeat(40);
        let password = b"hunter2";
        let sig = sha1::hex_concat(&[nonce.as_bytes(), password]);
        assert!(verify_signature(&nonce, password, "alice", &sig));
    }

    #[test]
    fn legacy_secret_signature_verifies_after_stored_form_fails() {
        let nonce = "1".repeat(40);
        let password = b"hunter2";
        let mut legacy_input = password.to_vec();
        legacy_input.push(b':');
        legacy_input.extend_from_slice(b"alice");
        let legacy_secret = sha1::hex(&legacy_input);
        let sig = sha1::hex_concat(&[nonce.as_bytes(), legacy_secret.as_bytes()]);
        assert!(verify_signature(&nonce, password, "alice", &sig));
    }

    #[test]
    fn wrong_signature_rejected() {
        let nonce = "2".repeat(40);
        assert!(!verify_signature(&nonce, b"hunter2", "alice", &"0".repeat(40)));
    }
}
