use std::sync::Arc;

use authlane_common::url_params::{fragment_params, param, query_params};
use authlane_domain::constants::REFRESH_TOKEN_NONCE_PLACEHOLDER;
use authlane_domain::{
    AuthError, AuthResult, CallbackContext, CustomParams, Result, ValidationResult,
};
use tracing::{debug, instrument, warn};

use super::{
    CallbackPipeline, CallbackStage, CodeRequestStage, ErrorCheckStage, KeyRetrievalStage,
    RefreshTokenRequestStage, StateValidationStage, TokenPersistenceStage, UserDataStage,
};
use crate::config_provider::ConfigurationProvider;
use crate::ports::{NavigationSurface, OidcTransport};
use crate::reset::ResetAuthDataService;
use crate::signing_keys::SigninKeyDataService;
use crate::state::{AuthStateService, FlowsDataService, StoragePersistence};
use crate::url::UrlService;
use crate::user::UserService;
use crate::validation::{StateValidationService, TokenValidationService};
use crate::well_known::AuthWellKnownService;

/// Everything the callback stages need.
pub struct FlowsDependencies {
    pub config: Arc<ConfigurationProvider>,
    pub storage: StoragePersistence,
    pub flows_data: Arc<FlowsDataService>,
    pub auth_state: Arc<AuthStateService>,
    pub reset: Arc<ResetAuthDataService>,
    pub user: Arc<UserService>,
    pub url: Arc<UrlService>,
    pub well_known: Arc<AuthWellKnownService>,
    pub signing_keys: Arc<SigninKeyDataService>,
    pub validation: Arc<StateValidationService>,
    pub tokens: Arc<TokenValidationService>,
    pub transport: Arc<dyn OidcTransport>,
    pub navigation: Arc<dyn NavigationSurface>,
}

/// Entry points that turn a callback into validated tokens.
pub struct FlowsService {
    flows_data: Arc<FlowsDataService>,
    auth_state: Arc<AuthStateService>,
    reset: Arc<ResetAuthDataService>,
    url: Arc<UrlService>,
    well_known: Arc<AuthWellKnownService>,
    transport: Arc<dyn OidcTransport>,
    standard: Vec<Arc<dyn CallbackStage>>,
    code_pipeline: CallbackPipeline,
}

impl FlowsService {
    pub fn new(deps: FlowsDependencies) -> Self {
        let standard: Vec<Arc<dyn CallbackStage>> = vec![
            Arc::new(ErrorCheckStage::new(
                Arc::clone(&deps.reset),
                Arc::clone(&deps.flows_data),
                Arc::clone(&deps.auth_state),
            )),
            Arc::new(KeyRetrievalStage::new(
                deps.storage.clone(),
                Arc::clone(&deps.config),
                Arc::clone(&deps.navigation),
                Arc::clone(&deps.signing_keys),
            )),
            Arc::new(StateValidationStage::new(
                Arc::clone(&deps.validation),
                Arc::clone(&deps.reset),
                Arc::clone(&deps.auth_state),
            )),
            Arc::new(TokenPersistenceStage::new(
                Arc::clone(&deps.auth_state),
                Arc::clone(&deps.flows_data),
            )),
            Arc::new(UserDataStage::new(
                Arc::clone(&deps.config),
                Arc::clone(&deps.user),
                Arc::clone(&deps.reset),
                Arc::clone(&deps.auth_state),
            )),
        ];

        let code_request: Arc<dyn CallbackStage> = Arc::new(CodeRequestStage::new(
            Arc::clone(&deps.flows_data),
            Arc::clone(&deps.url),
            Arc::clone(&deps.well_known),
            Arc::clone(&deps.transport),
            Arc::clone(&deps.tokens),
        ));
        let code_pipeline = CallbackPipeline::new(
            std::iter::once(code_request).chain(standard.iter().cloned()).collect(),
            Arc::clone(&deps.reset),
        );

        Self {
            flows_data: deps.flows_data,
            auth_state: deps.auth_state,
            reset: deps.reset,
            url: deps.url,
            well_known: deps.well_known,
            transport: deps.transport,
            standard,
            code_pipeline,
        }
    }

    /// The five stages shared by every flow.
    #[must_use]
    pub fn callback_pipeline(&self) -> CallbackPipeline {
        CallbackPipeline::new(self.standard.clone(), Arc::clone(&self.reset))
    }

    /// Build a context from a code-flow redirect URL.
    ///
    /// # Errors
    /// `AuthError::StateValidation` when the URL carries neither `state`
    /// nor an STS error.
    pub fn code_flow_callback(&self, url: &str, is_renew_process: bool) -> Result<CallbackContext> {
        let params = query_params(url);
        let state = param(&params, "state").map(str::to_string);
        let session_state = param(&params, "session_state").map(str::to_string);

        if let Some(error) = param(&params, "error") {
            let auth_result = AuthResult {
                error: Some(error.to_string()),
                error_description: param(&params, "error_description").map(str::to_string),
                state,
                session_state,
                ..AuthResult::default()
            };
            return Ok(CallbackContext::from_auth_result(auth_result, is_renew_process));
        }

        if state.is_none() {
            debug!("no state in url");
            return Err(AuthError::StateValidation(ValidationResult::StatesDoNotMatch));
        }
        let code = param(&params, "code").map(str::to_string);
        if code.is_none() {
            debug!("no code in url");
        }

        Ok(CallbackContext {
            code,
            state,
            session_state,
            is_renew_process,
            ..CallbackContext::default()
        })
    }

    /// Handle the redirect of an interactive code-flow login.
    #[instrument(skip(self, url))]
    pub async fn process_code_flow_callback(&self, url: &str) -> Result<CallbackContext> {
        let context = self.code_flow_callback(url, false)?;
        self.code_pipeline.execute(context).await
    }

    /// Handle a code-flow response delivered to the renew frame.
    pub async fn process_silent_renew_code_flow_callback(
        &self,
        context: CallbackContext,
    ) -> Result<CallbackContext> {
        self.code_pipeline.execute(context).await
    }

    /// Handle an implicit-flow fragment (`#access_token=...`).
    #[instrument(skip(self, hash))]
    pub async fn process_implicit_flow_callback(
        &self,
        hash: &str,
        is_renew_process: bool,
    ) -> Result<CallbackContext> {
        let params = fragment_params(hash);
        let auth_result =
            AuthResult::from_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let context = CallbackContext::from_auth_result(auth_result, is_renew_process);
        self.callback_pipeline().execute(context).await
    }

    /// Renew with the stored refresh token.
    #[instrument(skip(self, custom_params))]
    pub async fn process_refresh_token(
        &self,
        custom_params: &CustomParams,
    ) -> Result<CallbackContext> {
        let state = self.flows_data.get_existing_or_create_auth_state_control()?;
        self.flows_data.set_nonce(REFRESH_TOKEN_NONCE_PLACEHOLDER)?;

        let refresh_token = self.auth_state.get_refresh_token();
        if refresh_token.is_none() {
            warn!("no refresh token stored");
        }
        let context = CallbackContext {
            refresh_token,
            state: Some(state),
            is_renew_process: true,
            existing_id_token: self.auth_state.stored_id_token(),
            ..CallbackContext::default()
        };

        let request: Arc<dyn CallbackStage> = Arc::new(RefreshTokenRequestStage::new(
            Arc::clone(&self.url),
            Arc::clone(&self.well_known),
            Arc::clone(&self.transport),
            custom_params.clone(),
        ));
        let pipeline = CallbackPipeline::new(
            std::iter::once(request).chain(self.standard.iter().cloned()).collect(),
            Arc::clone(&self.reset),
        );
        pipeline.execute(context).await
    }

    /// Run the shared stages over an already-parsed authorization result.
    pub async fn handle_callback(
        &self,
        auth_result: AuthResult,
        is_renew_process: bool,
        refresh_token: Option<String>,
    ) -> Result<CallbackContext> {
        let mut context = CallbackContext::from_auth_result(auth_result, is_renew_process);
        if refresh_token.is_some() {
            context.existing_id_token = self.auth_state.stored_id_token();
        }
        context.refresh_token = refresh_token;
        self.callback_pipeline().execute(context).await
    }
}
