//! Context threaded through the callback pipeline

use serde::{Deserialize, Serialize};

use super::auth_result::AuthResult;
use super::jwt_keys::JwtKeys;
use super::validation::StateValidationResult;
use crate::errors::{AuthError, Result};

/// Per-callback record passed from stage to stage.
///
/// Created fresh for every callback invocation. Stages add fields but never
/// overwrite one that an earlier stage already set; the `set_*` methods
/// enforce this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackContext {
    /// Authorization code (code flow only)
    pub code: Option<String>,
    /// Refresh token the renewal started from
    pub refresh_token: Option<String>,
    /// `state` parameter received with the callback
    pub state: Option<String>,
    pub session_state: Option<String>,
    pub auth_result: Option<AuthResult>,
    pub is_renew_process: bool,
    pub jwt_keys: Option<JwtKeys>,
    pub validation_result: Option<StateValidationResult>,
    /// Id token held before a refresh, compared against the new one
    pub existing_id_token: Option<String>,
}

impl CallbackContext {
    /// Context for a response that already carries tokens or an error.
    #[must_use]
    pub fn from_auth_result(auth_result: AuthResult, is_renew_process: bool) -> Self {
        Self {
            state: auth_result.state.clone(),
            session_state: auth_result.session_state.clone(),
            auth_result: Some(auth_result),
            is_renew_process,
            ..Self::default()
        }
    }

    pub fn set_auth_result(&mut self, auth_result: AuthResult) -> Result<()> {
        set_once(&mut self.auth_result, auth_result, "auth_result")
    }

    pub fn set_jwt_keys(&mut self, keys: JwtKeys) -> Result<()> {
        set_once(&mut self.jwt_keys, keys, "jwt_keys")
    }

    pub fn set_validation_result(&mut self, result: StateValidationResult) -> Result<()> {
        set_once(&mut self.validation_result, result, "validation_result")
    }

    /// Error code carried by the authorization result, if any.
    #[must_use]
    pub fn auth_error(&self) -> Option<&str> {
        self.auth_result
            .as_ref()
            .filter(|result| result.has_error())
            .and_then(|result| result.error.as_deref())
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.is_some() {
        return Err(AuthError::Internal(format!("callback context field `{field}` already set")));
    }
    *slot = Some(value);
    Ok(())
}
