//! Stateless helpers shared across Authlane crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: random/PKCE generation, JWT segment decoding, URL
//!   parameter handling, clock abstraction

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod crypto;
#[cfg(feature = "foundation")]
pub mod jwt;
#[cfg(feature = "foundation")]
pub mod time;
#[cfg(feature = "foundation")]
pub mod url_params;

// Re-export commonly used types and functions
// ------------------------
#[cfg(feature = "foundation")]
pub use crypto::pkce::{
    constant_time_eq, generate_code_challenge, generate_code_verifier, generate_nonce,
    generate_state, PkceChallenge,
};
#[cfg(feature = "foundation")]
pub use jwt::{JwtDecodeError, JwtParts};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
