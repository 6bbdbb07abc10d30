//! Published authorization state

use serde::{Deserialize, Serialize};

use super::validation::ValidationResult;
use crate::impl_auth_enum_conversions;

/// Whether the client currently holds a validated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizedState {
    Authorized,
    #[default]
    Unauthorized,
}

impl_auth_enum_conversions!(AuthorizedState {
    Authorized => "authorized",
    Unauthorized => "unauthorized",
});

/// A single authorization state transition.
///
/// Only the callback pipeline and the reset paths publish these; every other
/// component reads the latest value or waits for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub authorization_state: AuthorizedState,
    pub validation_result: ValidationResult,
    /// `true` when the transition happened during a silent renew.
    pub is_renew_process: bool,
}

impl AuthorizationResult {
    #[must_use]
    pub const fn authorized(validation_result: ValidationResult, is_renew_process: bool) -> Self {
        Self {
            authorization_state: AuthorizedState::Authorized,
            validation_result,
            is_renew_process,
        }
    }

    #[must_use]
    pub const fn unauthorized(validation_result: ValidationResult, is_renew_process: bool) -> Self {
        Self {
            authorization_state: AuthorizedState::Unauthorized,
            validation_result,
            is_renew_process,
        }
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.authorization_state == AuthorizedState::Authorized
    }
}

/// Tokens handed back by a forced refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}
