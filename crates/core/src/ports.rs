//! Port interfaces for the relying party
//!
//! These traits define the boundaries between the token lifecycle and the
//! infrastructure that persists values, talks to the STS and drives the
//! host's navigation surface.

use async_trait::async_trait;
use authlane_domain::{JwtKeys, Result};
use serde_json::Value;

/// Key-value persistence for named slots.
///
/// Backed by browser-style storage, so access is synchronous.
pub trait AuthStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// HTTP access to the STS endpoints.
#[async_trait]
pub trait OidcTransport: Send + Sync {
    /// GET a JSON document, optionally with a bearer token.
    ///
    /// Used for discovery, JWKS and user info.
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value>;

    /// POST an `application/x-www-form-urlencoded` body and parse the JSON
    /// response. Non-success statuses are errors.
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Value>;
}

/// The host's browser-like navigation capabilities.
#[async_trait]
pub trait NavigationSurface: Send + Sync {
    /// Point the hidden, reusable renew frame at `url`.
    ///
    /// Resolves once the frame's load event fires. `generation` identifies
    /// the renewal attempt and must be echoed in the completion message.
    async fn load_silent_renew_frame(&self, url: &str, generation: u64) -> Result<()>;

    /// Replace the current history entry, dropping callback parameters.
    fn replace_history_state(&self, url: &str);

    /// Navigate the top-level context (authorize and end-session redirects).
    async fn navigate(&self, url: &str) -> Result<()>;
}

/// Verifies an id-token signature against the issuer's keys.
pub trait TokenSignatureVerifier: Send + Sync {
    fn verify(&self, id_token: &str, keys: &JwtKeys) -> bool;
}
