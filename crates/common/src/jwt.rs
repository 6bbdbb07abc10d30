//! JWT segment decoding
//!
//! Splits a compact JWS into its three segments and decodes the header and
//! payload as JSON. No signature verification happens here; that is the job
//! of the signature verifier behind the core port.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Why a token could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtDecodeError {
    #[error("token must have three dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("{segment} segment is not valid base64url")]
    Base64 { segment: &'static str },

    #[error("{segment} segment is not a JSON object")]
    Json { segment: &'static str },
}

/// Decoded header and payload of a compact JWS.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtParts {
    pub header: Value,
    pub payload: Value,
    /// Raw base64url signature segment
    pub signature: String,
}

impl JwtParts {
    /// Decode `token` without verifying it.
    ///
    /// # Errors
    /// Returns [`JwtDecodeError`] when the token is not three segments or a
    /// segment is not base64url-encoded JSON.
    pub fn decode(token: &str) -> Result<Self, JwtDecodeError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(JwtDecodeError::SegmentCount(segments.len()));
        };

        Ok(Self {
            header: decode_segment(header, "header")?,
            payload: decode_segment(payload, "payload")?,
            signature: (*signature).to_string(),
        })
    }

    /// `kid` header value, if present.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }

    /// `alg` header value, if present.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// Numeric claim such as `exp` or `iat`.
    #[must_use]
    pub fn numeric_claim(&self, name: &str) -> Option<i64> {
        let value = self.payload.get(name)?;
        value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
    }

    /// String claim such as `iss`, `sub` or `nonce`.
    #[must_use]
    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }
}

/// Decode only the payload of `token`.
///
/// # Errors
/// See [`JwtParts::decode`].
pub fn decode_payload(token: &str) -> Result<Value, JwtDecodeError> {
    JwtParts::decode(token).map(|parts| parts.payload)
}

/// Compute the OIDC `at_hash` of an access token.
///
/// The left-most half of the hash of the token, base64url-encoded. The hash
/// function follows the id-token `alg` suffix (256, 384 or 512; default 256).
#[must_use]
pub fn at_hash(access_token: &str, alg: &str) -> String {
    let digest: Vec<u8> = if alg.ends_with("384") {
        Sha384::digest(access_token.as_bytes()).to_vec()
    } else if alg.ends_with("512") {
        Sha512::digest(access_token.as_bytes()).to_vec()
    } else {
        Sha256::digest(access_token.as_bytes()).to_vec()
    };
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Value, JwtDecodeError> {
    // Some issuers pad their segments.
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| URL_SAFE.decode(segment))
        .map_err(|_| JwtDecodeError::Base64 { segment: name })?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|_| JwtDecodeError::Json { segment: name })?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(JwtDecodeError::Json { segment: name })
    }
}
