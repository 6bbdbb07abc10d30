use std::sync::Arc;

use authlane_common::jwt::JwtParts;
use authlane_common::Clock;
use authlane_domain::constants::storage_keys;
use authlane_domain::{AuthResult, AuthorizationResult, Result, ValidationResult};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::StoragePersistence;
use crate::config_provider::ConfigurationProvider;

/// Stored tokens plus the published authorization state.
pub struct AuthStateService {
    storage: StoragePersistence,
    config: Arc<ConfigurationProvider>,
    clock: Arc<dyn Clock>,
    authorization: watch::Sender<AuthorizationResult>,
    authenticated: watch::Sender<bool>,
}

impl AuthStateService {
    pub fn new(
        storage: StoragePersistence,
        config: Arc<ConfigurationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            config,
            clock,
            authorization: watch::channel(AuthorizationResult::default()).0,
            authenticated: watch::channel(false).0,
        }
    }

    /// Persist the access token and its expiry, then mark the session
    /// authenticated.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if a slot cannot be written.
    pub fn set_authorization_data(
        &self,
        access_token: &str,
        auth_result: &AuthResult,
    ) -> Result<()> {
        debug!("storing the access token");
        self.storage.write(storage_keys::AUTHZ_DATA, &access_token)?;

        let expires_at = auth_result.expires_in.and_then(|expires_in| {
            let expires_at = self.clock.unix_seconds().checked_add(expires_in);
            if expires_at.is_none() {
                warn!(expires_in, "expires_in out of range, storing no access token expiry");
            }
            expires_at
        });
        match expires_at {
            Some(expires_at) => {
                self.storage.write(storage_keys::ACCESS_TOKEN_EXPIRES_AT, &expires_at)?;
            }
            None => self.storage.remove(storage_keys::ACCESS_TOKEN_EXPIRES_AT)?,
        }

        self.authenticated.send_replace(true);
        Ok(())
    }

    /// Clear stored tokens and mark the session unauthenticated.
    ///
    /// A held `Authorized` state is replaced by `Unauthorized`; an already
    /// unauthorized state keeps its validation code.
    pub fn set_unauthorized_and_fire_event(&self) {
        self.storage.remove_logged(storage_keys::AUTHZ_DATA);
        self.storage.remove_logged(storage_keys::AUTHN_RESULT);
        self.storage.remove_logged(storage_keys::ACCESS_TOKEN_EXPIRES_AT);

        self.authenticated.send_replace(false);
        self.authorization.send_if_modified(|current| {
            if current.is_authorized() {
                *current = AuthorizationResult::unauthorized(
                    ValidationResult::None,
                    current.is_renew_process,
                );
                true
            } else {
                false
            }
        });
    }

    /// Resume a session persisted by an earlier run.
    ///
    /// Publishes `Authorized` when an access token is stored and neither
    /// token has expired; returns whether it did.
    pub fn restore_persisted_session(&self) -> bool {
        if self.storage.access_token().is_none()
            || self.has_id_token_expired()
            || self.has_access_token_expired_if_expiry_exists()
        {
            return false;
        }
        info!("restoring persisted session");
        let restored = AuthorizationResult::authorized(ValidationResult::Ok, false);
        self.update_and_publish_auth_state(restored);
        true
    }

    /// Publish a new authorization state.
    pub fn update_and_publish_auth_state(&self, result: AuthorizationResult) {
        debug!(
            state = %result.authorization_state,
            validation = %result.validation_result,
            is_renew = result.is_renew_process,
            "publishing authorization state"
        );
        self.authenticated.send_replace(result.is_authorized());
        self.authorization.send_replace(result);
    }

    #[must_use]
    pub fn current(&self) -> AuthorizationResult {
        *self.authorization.borrow()
    }

    /// Stream of authorization state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationResult> {
        self.authorization.subscribe()
    }

    #[must_use]
    pub fn subscribe_authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Access token, only while authenticated.
    #[must_use]
    pub fn get_access_token(&self) -> Option<String> {
        self.is_authenticated().then(|| self.storage.access_token()).flatten()
    }

    /// Id token, only while authenticated.
    #[must_use]
    pub fn get_id_token(&self) -> Option<String> {
        self.is_authenticated().then(|| self.storage.id_token()).flatten()
    }

    /// Id token as stored, regardless of the authentication flag.
    #[must_use]
    pub fn stored_id_token(&self) -> Option<String> {
        self.storage.id_token()
    }

    #[must_use]
    pub fn get_refresh_token(&self) -> Option<String> {
        self.storage.refresh_token()
    }

    /// Whether the id-token `exp` (less the renew offset) has passed.
    ///
    /// A missing or undecodable token, or one without `exp`, is not expired.
    #[must_use]
    pub fn has_id_token_expired(&self) -> bool {
        let Some(id_token) = self.storage.id_token() else {
            return false;
        };
        let exp = JwtParts::decode(&id_token).ok().and_then(|parts| parts.numeric_claim("exp"));
        let Some(exp) = exp else {
            return false;
        };
        let expired = self.is_past(exp);
        if expired {
            debug!(exp, "id token has expired");
        }
        expired
    }

    /// Whether a stored access-token expiry has passed. Without a stored
    /// expiry the token never counts as expired.
    #[must_use]
    pub fn has_access_token_expired_if_expiry_exists(&self) -> bool {
        let Some(expires_at) = self.storage.read::<i64>(storage_keys::ACCESS_TOKEN_EXPIRES_AT)
        else {
            return false;
        };
        let expired = self.is_past(expires_at);
        if expired {
            debug!(expires_at, "access token has expired");
        }
        expired
    }

    /// Authenticated and neither token expired.
    #[must_use]
    pub fn are_auth_storage_tokens_valid(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        if self.has_id_token_expired() {
            info!("persisted id token is expired");
            return false;
        }
        if self.has_access_token_expired_if_expiry_exists() {
            info!("persisted access token is expired");
            return false;
        }
        true
    }

    fn is_past(&self, expiry_unix_seconds: i64) -> bool {
        let offset = self.config.get().silent_renew_offset_in_seconds;
        expiry_unix_seconds <= self.clock.unix_seconds().saturating_add(offset)
    }
}
