//! Protocol constants
//!
//! Centralized location for retry bounds, defaults and the names of the
//! persisted storage slots.

/// Number of times a timed-out forced refresh is retried before failing.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Backoff unit for forced-refresh retries; attempt `n` waits `n` units.
pub const RETRY_SCALING_MILLIS: u64 = 1000;

/// Default period of the periodic token check.
pub const DEFAULT_TOKEN_REFRESH_SECONDS: u64 = 4;

/// Default overall timeout for one iframe silent renew.
pub const DEFAULT_SILENT_RENEW_TIMEOUT_SECONDS: u64 = 20;

/// Default tolerated clock skew for the id-token `iat` claim.
pub const DEFAULT_MAX_IAT_OFFSET_SECONDS: i64 = 120;

/// Path appended to the STS base address for discovery.
pub const WELL_KNOWN_SUFFIX: &str = "/.well-known/openid-configuration";

/// Error code the STS returns when an interactive login is needed.
pub const LOGIN_REQUIRED_ERROR: &str = "login_required";

/// Names of the persisted key-value slots.
pub mod storage_keys {
    /// Access token of the current session.
    pub const AUTHZ_DATA: &str = "authzData";
    /// Raw authorization result of the last callback.
    pub const AUTHN_RESULT: &str = "authnResult";
    /// Unix timestamp (seconds) at which the access token expires.
    pub const ACCESS_TOKEN_EXPIRES_AT: &str = "access_token_expires_at";
    /// `session_state` returned with the original login.
    pub const SESSION_STATE: &str = "session_state";
    /// `state` parameter issued with the last authorize request.
    pub const AUTH_STATE_CONTROL: &str = "authStateControl";
    /// `nonce` issued with the last authorize request.
    pub const AUTH_NONCE: &str = "authNonce";
    /// PKCE verifier of the pending code flow.
    pub const CODE_VERIFIER: &str = "codeVerifier";
    /// Caller-supplied custom authorize parameters.
    pub const CUSTOM_REQUEST_PARAMS: &str = "storageCustomRequestParams";
    /// Cached discovery document.
    pub const AUTH_WELL_KNOWN_ENDPOINTS: &str = "authWellKnownEndPoints";
    /// Cached user data.
    pub const USER_DATA: &str = "userData";
}

/// Nonce stored while a refresh-token grant is in flight; id-tokens issued
/// by a refresh may omit the nonce claim.
pub const REFRESH_TOKEN_NONCE_PLACEHOLDER: &str = "--RefreshToken--";
