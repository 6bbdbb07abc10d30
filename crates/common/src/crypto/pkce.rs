//! PKCE (Proof Key for Code Exchange) and request correlation values
//!
//! Implements RFC 7636 for the authorization code flow and generates the
//! `state` and `nonce` values bound to each authorize request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

fn random_url_safe(bytes: usize) -> String {
    let mut buffer = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Generate a cryptographically secure code verifier
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43 characters).
/// Per RFC 7636, verifiers must be 43-128 characters long.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_url_safe(32)
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random `state` value for CSRF protection
#[must_use]
pub fn generate_state() -> String {
    random_url_safe(32)
}

/// Generate a random `nonce` bound into the id-token
#[must_use]
pub fn generate_nonce() -> String {
    random_url_safe(32)
}

/// Compare two secrets without early exit on the first differing byte.
#[must_use]
pub fn constant_time_eq(expected: &str, actual: &str) -> bool {
    let (a, b) = (expected.as_bytes(), actual.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// PKCE verifier/challenge pair for one authorize request
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    /// Kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of code_verifier (base64url encoded)
    /// Sent in authorization request for server validation
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new verifier and its S256 challenge.
    ///
    /// # Examples
    /// ```
    /// use authlane_common::PkceChallenge;
    ///
    /// let challenge = PkceChallenge::generate();
    /// assert!(challenge.code_verifier.len() >= 43);
    /// assert!(challenge.code_verifier.len() <= 128);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    /// Derive the challenge for an existing verifier.
    #[must_use]
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for crypto::pkce.
    use super::*;

    /// Validates verifier length bounds from RFC 7636.
    #[test]
    fn test_generate_pkce_challenge() {
        let challenge = PkceChallenge::generate();

        assert!(
            challenge.code_verifier.len() >= 43,
            "code_verifier too short: {} chars",
            challenge.code_verifier.len()
        );
        assert!(challenge.code_verifier.len() <= 128);
        assert!(!challenge.code_challenge.is_empty());
        assert_eq!(challenge.challenge_method(), "S256");
    }

    /// Validates that consecutive generations never repeat.
    #[test]
    fn test_unique_values() {
        assert_ne!(generate_state(), generate_state());
        assert_ne!(generate_nonce(), generate_nonce());
        assert_ne!(
            PkceChallenge::generate().code_verifier,
            PkceChallenge::generate().code_verifier
        );
    }

    /// Validates the RFC 7636 appendix B test vector.
    #[test]
    fn test_code_challenge_rfc_vector() {
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    /// Validates base64url alphabet without padding.
    #[test]
    fn test_base64url_encoding() {
        let challenge = PkceChallenge::generate();
        for value in [&challenge.code_verifier, &challenge.code_challenge, &generate_state()] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
