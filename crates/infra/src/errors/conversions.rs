//! Conversions from external infrastructure errors into domain errors.

use authlane_domain::AuthError;
use reqwest::Error as ReqwestError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthError);

impl From<InfraError> for AuthError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthError> for InfraError {
    fn from(value: AuthError) -> Self {
        Self(value)
    }
}

trait IntoAuthError {
    fn into_auth_error(self) -> AuthError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthError */
/* -------------------------------------------------------------------------- */

impl IntoAuthError for ReqwestError {
    fn into_auth_error(self) -> AuthError {
        if self.is_timeout() {
            return AuthError::Transport("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AuthError::Transport("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return AuthError::Transport(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        if self.is_decode() {
            return AuthError::Transport(format!("invalid response body: {self}"));
        }

        AuthError::Transport(self.to_string())
    }
}

impl From<ReqwestError> for InfraError {
    fn from(value: ReqwestError) -> Self {
        Self(value.into_auth_error())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → AuthError */
/* -------------------------------------------------------------------------- */

impl IntoAuthError for serde_json::Error {
    fn into_auth_error(self) -> AuthError {
        AuthError::Internal(format!("JSON serialization failed: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.into_auth_error())
    }
}
