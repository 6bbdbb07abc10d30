//! Error types used throughout the relying party

use thiserror::Error;

use crate::types::ValidationResult;

/// Main error type for Authlane
///
/// Every failure surfaced by the token lifecycle maps onto one of these
/// variants. Whether a failure also reset local authorization data is a
/// property of the operation that produced it, not of the variant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The STS answered the authorize request with an error code.
    #[error("authorization callback came with error: {error}")]
    Protocol { error: String, description: Option<String> },

    /// Signing keys could not be fetched from the issuer.
    #[error("Failed to retrieve signing key with error: {0}")]
    KeyRetrieval(String),

    /// State, signature or claims validation rejected the response.
    #[error("state validation failed: {0}")]
    StateValidation(ValidationResult),

    /// User info could not be obtained after a successful validation.
    #[error("{0}")]
    UserInfo(UserInfoFailure),

    /// An iframe silent renew did not complete in time.
    #[error("silent renew timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Network call failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The token endpoint rejected a grant, or no refresh token was stored.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The hidden renew frame could not be obtained or navigated.
    #[error("iframe renew failed: {0}")]
    IframeRenew(String),

    /// Persistence backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error is eligible for the forced-refresh retry loop.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The validation code carried by this error, if any.
    #[must_use]
    pub const fn validation_result(&self) -> Option<ValidationResult> {
        match self {
            Self::StateValidation(result) => Some(*result),
            _ => None,
        }
    }
}

/// Why the user-data stage failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserInfoFailure {
    /// The user-info call succeeded but produced no data.
    #[error("Called for userData but they were empty")]
    Empty,

    /// The user-info call itself failed.
    #[error("Failed to retrieve user info with error: {0}")]
    RetrievalFailed(String),
}

/// Result type alias for Authlane operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_retrieval_message_wraps_cause() {
        let err = AuthError::KeyRetrieval("Failed to retrieve signing key".into());
        assert_eq!(
            err.to_string(),
            "Failed to retrieve signing key with error: Failed to retrieve signing key"
        );
    }

    #[test]
    fn user_info_messages_distinguish_empty_from_failed() {
        let empty = AuthError::UserInfo(UserInfoFailure::Empty);
        let failed = AuthError::UserInfo(UserInfoFailure::RetrievalFailed("503".into()));
        assert_ne!(empty.to_string(), failed.to_string());
        assert!(failed.to_string().contains("503"));
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(AuthError::Timeout { seconds: 20 }.is_timeout());
        assert!(!AuthError::Transport("reset".into()).is_timeout());
        assert!(!AuthError::StateValidation(ValidationResult::SignatureFailed).is_timeout());
    }

    #[test]
    fn validation_result_is_exposed() {
        let err = AuthError::StateValidation(ValidationResult::IncorrectNonce);
        assert_eq!(err.validation_result(), Some(ValidationResult::IncorrectNonce));
        assert_eq!(AuthError::Internal("x".into()).validation_result(), None);
    }
}
