use std::sync::Arc;

use async_trait::async_trait;
use authlane_domain::constants::{storage_keys, LOGIN_REQUIRED_ERROR};
use authlane_domain::{
    AuthError, AuthorizationResult, CallbackContext, Result, UserInfoFailure, ValidationResult,
};
use tracing::{debug, info, warn};

use super::CallbackStage;
use crate::config_provider::ConfigurationProvider;
use crate::ports::NavigationSurface;
use crate::reset::ResetAuthDataService;
use crate::signing_keys::SigninKeyDataService;
use crate::state::{AuthStateService, FlowsDataService, StoragePersistence};
use crate::user::UserService;
use crate::validation::StateValidationService;

fn internal(message: &str) -> AuthError {
    AuthError::Internal(message.to_string())
}

/// Fails on an STS error code, publishing `LoginRequired` or
/// `SecureTokenServerError`.
pub struct ErrorCheckStage {
    reset: Arc<ResetAuthDataService>,
    flows_data: Arc<FlowsDataService>,
    auth_state: Arc<AuthStateService>,
}

impl ErrorCheckStage {
    pub fn new(
        reset: Arc<ResetAuthDataService>,
        flows_data: Arc<FlowsDataService>,
        auth_state: Arc<AuthStateService>,
    ) -> Self {
        Self { reset, flows_data, auth_state }
    }

    fn reset_all(&self) {
        self.reset.reset_authorization_data();
        if let Err(err) = self.flows_data.set_nonce("") {
            warn!(error = %err, "failed to clear nonce");
        }
    }
}

#[async_trait]
impl CallbackStage for ErrorCheckStage {
    fn name(&self) -> &'static str {
        "error_check"
    }

    async fn run(&self, context: CallbackContext) -> Result<CallbackContext> {
        let Some(auth_result) = context.auth_result.as_ref() else {
            self.reset_all();
            return Err(internal("callback context has no authorization result"));
        };
        let Some(error) = context.auth_error() else {
            return Ok(context);
        };

        let validation_result = if error == LOGIN_REQUIRED_ERROR {
            ValidationResult::LoginRequired
        } else {
            ValidationResult::SecureTokenServerError
        };
        warn!(error, "authorization callback came with an error");

        let err = AuthError::Protocol {
            error: error.to_string(),
            description: auth_result.error_description.clone(),
        };
        self.reset_all();
        self.auth_state.update_and_publish_auth_state(AuthorizationResult::unauthorized(
            validation_result,
            context.is_renew_process,
        ));
        Err(err)
    }

    fn resets_on_failure(&self) -> bool {
        true
    }
}

/// Persists the raw result, cleans up history and fetches signing keys.
pub struct KeyRetrievalStage {
    storage: StoragePersistence,
    config: Arc<ConfigurationProvider>,
    navigation: Arc<dyn NavigationSurface>,
    signing_keys: Arc<SigninKeyDataService>,
}

impl KeyRetrievalStage {
    pub fn new(
        storage: StoragePersistence,
        config: Arc<ConfigurationProvider>,
        navigation: Arc<dyn NavigationSurface>,
        signing_keys: Arc<SigninKeyDataService>,
    ) -> Self {
        Self { storage, config, navigation, signing_keys }
    }
}

#[async_trait]
impl CallbackStage for KeyRetrievalStage {
    fn name(&self) -> &'static str {
        "key_retrieval"
    }

    async fn run(&self, mut context: CallbackContext) -> Result<CallbackContext> {
        let mut to_store =
            context.auth_result.clone().ok_or_else(|| internal("missing authorization result"))?;
        // Refresh responses may omit the id token; keep the previous one.
        if to_store.id_token.as_deref().map_or(true, str::is_empty) {
            to_store.id_token = self.storage.id_token();
        }
        self.storage.write(storage_keys::AUTHN_RESULT, &to_store)?;

        let config = self.config.get();
        if !config.history_cleanup_off && !context.is_renew_process {
            self.navigation.replace_history_state(&config.redirect_url);
        } else {
            debug!("history clean up inactive");
        }

        let keys = self.signing_keys.get_signing_keys().await?;
        context.set_jwt_keys(keys)?;
        Ok(context)
    }
}

/// Runs state and token validation; a rejected response publishes
/// `Unauthorized` with the failing code.
pub struct StateValidationStage {
    validation: Arc<StateValidationService>,
    reset: Arc<ResetAuthDataService>,
    auth_state: Arc<AuthStateService>,
}

impl StateValidationStage {
    pub fn new(
        validation: Arc<StateValidationService>,
        reset: Arc<ResetAuthDataService>,
        auth_state: Arc<AuthStateService>,
    ) -> Self {
        Self { validation, reset, auth_state }
    }

    fn reject(
        &self,
        context: &CallbackContext,
        code: ValidationResult,
        err: AuthError,
    ) -> AuthError {
        self.reset.reset_authorization_data();
        let unauthorized = AuthorizationResult::unauthorized(code, context.is_renew_process);
        self.auth_state.update_and_publish_auth_state(unauthorized);
        err
    }
}

#[async_trait]
impl CallbackStage for StateValidationStage {
    fn name(&self) -> &'static str {
        "state_validation"
    }

    async fn run(&self, mut context: CallbackContext) -> Result<CallbackContext> {
        let result = self.validation.get_validated_state_result(&context);
        if !result.auth_response_is_valid {
            let code = result.state;
            warn!(validation = %code, "authorization failed: response is not valid");
            return Err(self.reject(&context, code, AuthError::StateValidation(code)));
        }
        if let Err(err) = context.set_validation_result(result) {
            return Err(self.reject(&context, ValidationResult::None, err));
        }
        Ok(context)
    }

    fn resets_on_failure(&self) -> bool {
        true
    }
}

/// Stores the validated tokens and the session state.
pub struct TokenPersistenceStage {
    auth_state: Arc<AuthStateService>,
    flows_data: Arc<FlowsDataService>,
}

impl TokenPersistenceStage {
    pub fn new(auth_state: Arc<AuthStateService>, flows_data: Arc<FlowsDataService>) -> Self {
        Self { auth_state, flows_data }
    }
}

#[async_trait]
impl CallbackStage for TokenPersistenceStage {
    fn name(&self) -> &'static str {
        "token_persistence"
    }

    async fn run(&self, context: CallbackContext) -> Result<CallbackContext> {
        let validated = context
            .validation_result
            .as_ref()
            .ok_or_else(|| internal("missing validation result"))?;
        let auth_result =
            context.auth_result.as_ref().ok_or_else(|| internal("missing authorization result"))?;

        self.auth_state.set_authorization_data(&validated.access_token, auth_result)?;

        // Session state belongs to the original login.
        if context.refresh_token.is_some() && context.is_renew_process {
            debug!("refresh renewal, keeping stored session state");
        } else {
            self.flows_data.set_session_state(auth_result.session_state.as_deref())?;
        }
        Ok(context)
    }
}

/// Resolves user data and publishes `Authorized`.
pub struct UserDataStage {
    config: Arc<ConfigurationProvider>,
    user: Arc<UserService>,
    reset: Arc<ResetAuthDataService>,
    auth_state: Arc<AuthStateService>,
}

impl UserDataStage {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        user: Arc<UserService>,
        reset: Arc<ResetAuthDataService>,
        auth_state: Arc<AuthStateService>,
    ) -> Self {
        Self { config, user, reset, auth_state }
    }

    fn fail(
        &self,
        context: &CallbackContext,
        code: ValidationResult,
        err: AuthError,
    ) -> AuthError {
        self.reset.reset_authorization_data();
        let unauthorized = AuthorizationResult::unauthorized(code, context.is_renew_process);
        self.auth_state.update_and_publish_auth_state(unauthorized);
        err
    }
}

#[async_trait]
impl CallbackStage for UserDataStage {
    fn name(&self) -> &'static str {
        "user_data"
    }

    async fn run(&self, context: CallbackContext) -> Result<CallbackContext> {
        let config = self.config.get();
        let Some(validated) = context.validation_result.as_ref() else {
            let err = internal("missing validation result");
            return Err(self.fail(&context, ValidationResult::None, err));
        };
        let code = validated.state;
        let authorized = AuthorizationResult::authorized(code, context.is_renew_process);

        if !config.auto_userinfo {
            if !context.is_renew_process || config.renew_userinfo_after_token_renew {
                if let Some(claims) = validated.decoded_id_token.clone() {
                    if let Err(err) = self.user.set_user_data_to_store(claims) {
                        return Err(self.fail(&context, code, err));
                    }
                }
            }
            self.auth_state.update_and_publish_auth_state(authorized);
            return Ok(context);
        }

        let claims = validated.decoded_id_token.as_ref();
        match self.user.get_and_persist_user_data_in_store(context.is_renew_process, claims).await {
            Ok(Some(_)) => {
                let is_renew = context.is_renew_process;
                info!(is_renew, "user data retrieved, session authorized");
                self.auth_state.update_and_publish_auth_state(authorized);
                Ok(context)
            }
            Ok(None) => Err(self.fail(&context, code, AuthError::UserInfo(UserInfoFailure::Empty))),
            Err(err) => {
                let failure = UserInfoFailure::RetrievalFailed(err.to_string());
                Err(self.fail(&context, code, AuthError::UserInfo(failure)))
            }
        }
    }

    fn resets_on_failure(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use authlane_common::MockClock;
    use authlane_domain::{AuthResult, AuthorizedState, OpenIdConfiguration, StateValidationResult};
    use serde_json::json;

    use super::*;
    use crate::testing::{
        test_configuration, AcceptAllVerifier, MockStorage, MockTransport, USERINFO_URL,
    };
    use crate::validation::TokenValidationService;
    use crate::well_known::AuthWellKnownService;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        storage: Arc<MockStorage>,
        transport: Arc<MockTransport>,
        config: Arc<ConfigurationProvider>,
        flows_data: Arc<FlowsDataService>,
        auth_state: Arc<AuthStateService>,
        well_known: Arc<AuthWellKnownService>,
        user: Arc<UserService>,
        reset: Arc<ResetAuthDataService>,
    }

    impl Fixture {
        fn new(config: OpenIdConfiguration) -> Self {
            let storage = Arc::new(MockStorage::new());
            let transport = Arc::new(MockTransport::with_discovery());
            let persistence = StoragePersistence::new(storage.clone());
            let config = Arc::new(ConfigurationProvider::new(config));
            let flows_data = Arc::new(FlowsDataService::new(persistence.clone()));
            let auth_state = Arc::new(AuthStateService::new(
                persistence.clone(),
                Arc::clone(&config),
                Arc::new(MockClock::at_unix(NOW)),
            ));
            let well_known = Arc::new(AuthWellKnownService::new(
                persistence.clone(),
                transport.clone(),
                Arc::clone(&config),
            ));
            let user = Arc::new(UserService::new(
                persistence,
                Arc::clone(&config),
                Arc::clone(&well_known),
                transport.clone(),
            ));
            let reset = Arc::new(ResetAuthDataService::new(
                Arc::clone(&config),
                Arc::clone(&user),
                Arc::clone(&flows_data),
                Arc::clone(&auth_state),
            ));
            Self { storage, transport, config, flows_data, auth_state, well_known, user, reset }
        }

        /// Tokens stored the way the persistence stage leaves them.
        fn store_tokens(&self) {
            self.auth_state.set_authorization_data("access-token", &AuthResult::default()).unwrap();
            assert!(self.auth_state.is_authenticated());
        }

        fn error_check(&self) -> ErrorCheckStage {
            ErrorCheckStage::new(
                Arc::clone(&self.reset),
                Arc::clone(&self.flows_data),
                Arc::clone(&self.auth_state),
            )
        }

        fn state_validation(&self) -> StateValidationStage {
            let validation = StateValidationService::new(
                Arc::clone(&self.config),
                Arc::clone(&self.flows_data),
                Arc::clone(&self.well_known),
                Arc::new(AcceptAllVerifier),
                TokenValidationService::new(Arc::new(MockClock::at_unix(NOW))),
            );
            StateValidationStage::new(
                Arc::new(validation),
                Arc::clone(&self.reset),
                Arc::clone(&self.auth_state),
            )
        }

        fn token_persistence(&self) -> TokenPersistenceStage {
            TokenPersistenceStage::new(Arc::clone(&self.auth_state), Arc::clone(&self.flows_data))
        }

        fn user_data(&self) -> UserDataStage {
            UserDataStage::new(
                Arc::clone(&self.config),
                Arc::clone(&self.user),
                Arc::clone(&self.reset),
                Arc::clone(&self.auth_state),
            )
        }

        fn assert_reset(&self) {
            assert!(!self.auth_state.is_authenticated());
            assert!(self.storage.get(storage_keys::AUTHZ_DATA).is_none());
            let published = self.auth_state.current();
            assert_eq!(published.authorization_state, AuthorizedState::Unauthorized);
        }
    }

    fn callback(auth_result: AuthResult, is_renew_process: bool) -> CallbackContext {
        CallbackContext::from_auth_result(auth_result, is_renew_process)
    }

    fn with_access_token() -> AuthResult {
        AuthResult { access_token: Some("access-token".into()), ..AuthResult::default() }
    }

    fn validated(is_renew_process: bool) -> CallbackContext {
        let mut context = callback(with_access_token(), is_renew_process);
        context
            .set_validation_result(StateValidationResult {
                access_token: "access-token".into(),
                auth_response_is_valid: true,
                state: ValidationResult::Ok,
                decoded_id_token: Some(json!({ "sub": "alice" })),
                ..StateValidationResult::default()
            })
            .unwrap();
        context
    }

    #[tokio::test]
    async fn error_check_passes_a_clean_response_through() {
        let fixture = Fixture::new(test_configuration());
        let context = callback(with_access_token(), false);

        let out = fixture.error_check().run(context.clone()).await.unwrap();

        assert_eq!(out, context);
        assert!(fixture.storage.ops().is_empty());
    }

    #[tokio::test]
    async fn error_check_distinguishes_login_required() {
        let fixture = Fixture::new(test_configuration());
        fixture.store_tokens();
        let login_required =
            AuthResult { error: Some("login_required".into()), ..AuthResult::default() };

        let err = fixture.error_check().run(callback(login_required, true)).await.unwrap_err();

        assert!(matches!(err, AuthError::Protocol { ref error, .. } if error == "login_required"));
        fixture.assert_reset();
        let published = fixture.auth_state.current();
        assert_eq!(published.validation_result, ValidationResult::LoginRequired);
        assert!(published.is_renew_process);
        assert_eq!(fixture.storage.get(storage_keys::AUTH_NONCE), Some(json!("")));

        let other = AuthResult { error: Some("invalid_scope".into()), ..AuthResult::default() };
        fixture.error_check().run(callback(other, false)).await.unwrap_err();
        let published = fixture.auth_state.current();
        assert_eq!(published.validation_result, ValidationResult::SecureTokenServerError);
    }

    #[tokio::test]
    async fn state_validation_rejects_a_foreign_state() {
        let fixture = Fixture::new(test_configuration());
        fixture.flows_data.set_auth_state_control("issued").unwrap();
        fixture.store_tokens();
        let forged = AuthResult { state: Some("forged".into()), ..AuthResult::default() };

        let err = fixture.state_validation().run(callback(forged, false)).await.unwrap_err();

        assert_eq!(err, AuthError::StateValidation(ValidationResult::StatesDoNotMatch));
        fixture.assert_reset();
        let published = fixture.auth_state.current();
        assert_eq!(published.validation_result, ValidationResult::StatesDoNotMatch);
    }

    #[tokio::test]
    async fn state_validation_resets_when_the_context_already_holds_a_result() {
        let fixture = Fixture::new(test_configuration());
        fixture.flows_data.set_auth_state_control("s1").unwrap();
        fixture.store_tokens();
        let mut context = validated(false);
        context.state = Some("s1".into());
        if let Some(auth_result) = context.auth_result.as_mut() {
            auth_result.state = Some("s1".into());
        }

        let err = fixture.state_validation().run(context).await.unwrap_err();

        assert!(matches!(err, AuthError::Internal(_)));
        fixture.assert_reset();
    }

    #[tokio::test]
    async fn token_persistence_keeps_session_state_on_refresh_renewals() {
        let fixture = Fixture::new(test_configuration());
        fixture.flows_data.set_session_state(Some("original")).unwrap();
        let auth_result = AuthResult {
            access_token: Some("access-token".into()),
            session_state: Some("renewed".into()),
            ..AuthResult::default()
        };
        let mut context = validated(true);
        context.auth_result = Some(auth_result.clone());
        context.refresh_token = Some("refresh-token".into());

        fixture.token_persistence().run(context).await.unwrap();
        assert_eq!(fixture.flows_data.session_state().as_deref(), Some("original"));

        let mut login = validated(false);
        login.auth_result = Some(auth_result);
        fixture.token_persistence().run(login).await.unwrap();
        assert_eq!(fixture.flows_data.session_state().as_deref(), Some("renewed"));
        assert!(fixture.auth_state.is_authenticated());
    }

    #[tokio::test]
    async fn user_data_from_claims_when_auto_userinfo_is_off() {
        let fixture =
            Fixture::new(OpenIdConfiguration { auto_userinfo: false, ..test_configuration() });

        fixture.user_data().run(validated(false)).await.unwrap();

        assert_eq!(fixture.user.get_user_data_from_store(), Some(json!({ "sub": "alice" })));
        assert_eq!(fixture.auth_state.current().authorization_state, AuthorizedState::Authorized);
        assert_eq!(fixture.transport.requests_to(USERINFO_URL), 0);
    }

    #[tokio::test]
    async fn user_data_write_failure_resets_the_session() {
        let fixture =
            Fixture::new(OpenIdConfiguration { auto_userinfo: false, ..test_configuration() });
        fixture.store_tokens();
        fixture.storage.fail_writes(true);

        let err = fixture.user_data().run(validated(false)).await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        fixture.assert_reset();
    }

    #[tokio::test]
    async fn user_data_without_validation_result_resets_the_session() {
        let fixture = Fixture::new(test_configuration());
        fixture.store_tokens();

        let context = callback(AuthResult::default(), false);
        let err = fixture.user_data().run(context).await.unwrap_err();

        assert!(matches!(err, AuthError::Internal(_)));
        fixture.assert_reset();
    }

    #[tokio::test]
    async fn empty_user_info_is_reported_as_empty() {
        let fixture = Fixture::new(test_configuration());
        fixture.store_tokens();
        fixture.transport.on_get(USERINFO_URL, Ok(json!({})));

        let err = fixture.user_data().run(validated(false)).await.unwrap_err();

        assert_eq!(err, AuthError::UserInfo(UserInfoFailure::Empty));
        assert_eq!(err.to_string(), "Called for userData but they were empty");
        fixture.assert_reset();
    }

    #[tokio::test]
    async fn failed_user_info_call_is_reported_as_retrieval_failure() {
        let fixture = Fixture::new(test_configuration());
        fixture.store_tokens();
        let refused = AuthError::Transport("connection refused".into());
        fixture.transport.on_get(USERINFO_URL, Err(refused));

        let err = fixture.user_data().run(validated(true)).await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::UserInfo(UserInfoFailure::RetrievalFailed(ref reason))
                if reason.contains("connection refused")
        ));
        assert!(err.to_string().starts_with("Failed to retrieve user info with error:"));
        fixture.assert_reset();
        assert!(fixture.auth_state.current().is_renew_process);
    }
}
