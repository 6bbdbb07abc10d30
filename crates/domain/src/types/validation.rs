//! Token validation outcomes

use serde::{Deserialize, Serialize};

use crate::impl_auth_enum_conversions;

/// Result code attached to every published authorization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    #[default]
    None,
    Ok,
    LoginRequired,
    SecureTokenServerError,
    StatesDoNotMatch,
    SignatureFailed,
    IncorrectNonce,
    RequiredPropertyMissing,
    MaxOffsetExpired,
    IssDoesNotMatchIssuer,
    NoAuthWellKnownEndPoints,
    IncorrectAud,
    IncorrectAzp,
    TokenExpired,
    IncorrectAtHash,
    IncorrectIdTokenClaimsAfterRefresh,
}

impl_auth_enum_conversions!(ValidationResult {
    None => "none",
    Ok => "ok",
    LoginRequired => "login_required",
    SecureTokenServerError => "secure_token_server_error",
    StatesDoNotMatch => "states_do_not_match",
    SignatureFailed => "signature_failed",
    IncorrectNonce => "incorrect_nonce",
    RequiredPropertyMissing => "required_property_missing",
    MaxOffsetExpired => "max_offset_expired",
    IssDoesNotMatchIssuer => "iss_does_not_match_issuer",
    NoAuthWellKnownEndPoints => "no_auth_well_known_end_points",
    IncorrectAud => "incorrect_aud",
    IncorrectAzp => "incorrect_azp",
    TokenExpired => "token_expired",
    IncorrectAtHash => "incorrect_at_hash",
    IncorrectIdTokenClaimsAfterRefresh => "incorrect_id_token_claims_after_refresh",
});

/// Output of the state-validation stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateValidationResult {
    pub access_token: String,
    pub id_token: String,
    pub auth_response_is_valid: bool,
    pub state: ValidationResult,
    /// Decoded id-token payload, present whenever an id-token was validated.
    pub decoded_id_token: Option<serde_json::Value>,
}

impl StateValidationResult {
    /// A failed result carrying only the reason.
    #[must_use]
    pub fn rejected(state: ValidationResult) -> Self {
        Self { state, ..Self::default() }
    }
}
