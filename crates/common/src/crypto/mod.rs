//! Cryptographic randomness for authorize requests
//!
//! - **[`pkce`]**: RFC 7636 verifier/challenge pairs, `state` and `nonce`

pub mod pkce;
