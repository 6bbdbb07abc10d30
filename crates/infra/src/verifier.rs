//! id-token signature verification against the issuer's JWKS.

use authlane_core::TokenSignatureVerifier;
use authlane_domain::JwtKeys;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, DecodingKey, Header, Validation};
use serde_json::Value;
use tracing::{debug, warn};

/// Verifies signatures with `jsonwebtoken`.
///
/// Only the signature is checked here. Expiry, audience and issuer are
/// validated by the core validation service, so the corresponding checks of
/// `jsonwebtoken` are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebTokenVerifier;

impl JsonWebTokenVerifier {
    pub const fn new() -> Self {
        Self
    }

    fn candidates<'a>(header: &Header, keys: &'a JwkSet) -> Vec<&'a Jwk> {
        match header.kid.as_deref() {
            Some(kid) => keys.find(kid).into_iter().collect(),
            None => keys.keys.iter().collect(),
        }
    }

    fn verify_with(token: &str, header: &Header, jwk: &Jwk) -> bool {
        if let Some(alg) = jwk.common.key_algorithm {
            if serde_json::to_value(alg).ok() != serde_json::to_value(header.alg).ok() {
                debug!(kid = ?jwk.common.key_id, "signing key is published for another algorithm");
                return false;
            }
        }

        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(err) => {
                debug!(error = %err, kid = ?jwk.common.key_id, "unusable signing key");
                return false;
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Value>(token, &key, &validation).is_ok()
    }
}

impl TokenSignatureVerifier for JsonWebTokenVerifier {
    fn verify(&self, id_token: &str, keys: &JwtKeys) -> bool {
        let header = match decode_header(id_token) {
            Ok(header) => header,
            Err(err) => {
                warn!(error = %err, "id token header could not be decoded");
                return false;
            }
        };

        let keys: JwkSet = match serde_json::to_value(keys).and_then(serde_json::from_value) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "issuer keys are not a valid JWKS");
                return false;
            }
        };

        let candidates = Self::candidates(&header, &keys);
        if candidates.is_empty() {
            warn!(kid = ?header.kid, "no signing key matches the id token");
            return false;
        }

        candidates.into_iter().any(|jwk| Self::verify_with(id_token, &header, jwk))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, Algorithm, EncodingKey};
    use serde_json::json;

    use super::*;

    const PRIVATE_KEY: &[u8] = include_bytes!("../tests/fixtures/rsa_private.pem");
    const JWKS: &str = include_str!("../tests/fixtures/jwks.json");

    fn keys() -> JwtKeys {
        serde_json::from_str(JWKS).unwrap()
    }

    fn sign(kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, &EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap()).unwrap()
    }

    fn claims() -> Value {
        // Long expired: expiry is not this verifier's concern.
        json!({
            "iss": "https://sts.example.com",
            "sub": "alice",
            "aud": "spa",
            "exp": 1,
            "iat": 0
        })
    }

    #[test]
    fn accepts_a_token_signed_by_the_published_key() {
        let token = sign(Some("authlane-test"), &claims());
        assert!(JsonWebTokenVerifier.verify(&token, &keys()));
    }

    #[test]
    fn token_without_kid_is_tried_against_every_key() {
        let token = sign(None, &claims());
        assert!(JsonWebTokenVerifier.verify(&token, &keys()));
    }

    #[test]
    fn rejects_unknown_kid() {
        let token = sign(Some("rotated-away"), &claims());
        assert!(!JsonWebTokenVerifier.verify(&token, &keys()));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let token = sign(Some("authlane-test"), &claims());
        let forged = sign(Some("authlane-test"), &json!({ "sub": "mallory" }));
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();

        assert!(!JsonWebTokenVerifier.verify(&parts.join("."), &keys()));
    }

    #[test]
    fn rejects_a_key_with_another_modulus() {
        let mut keys = keys();
        let modulus = keys.keys[0].n.clone().unwrap();
        keys.keys[0].n = Some(modulus.chars().rev().collect());

        let token = sign(Some("authlane-test"), &claims());
        assert!(!JsonWebTokenVerifier.verify(&token, &keys));
    }

    #[test]
    fn rejects_garbage_and_empty_key_sets() {
        assert!(!JsonWebTokenVerifier.verify("not-a-jwt", &keys()));
        let token = sign(Some("authlane-test"), &claims());
        assert!(!JsonWebTokenVerifier.verify(&token, &JwtKeys::default()));
    }
}
