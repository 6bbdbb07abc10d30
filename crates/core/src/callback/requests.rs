use std::sync::Arc;

use async_trait::async_trait;
use authlane_domain::{
    AuthError, AuthResult, CallbackContext, CustomParams, Result, ValidationResult,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::CallbackStage;
use crate::ports::OidcTransport;
use crate::state::FlowsDataService;
use crate::url::UrlService;
use crate::validation::TokenValidationService;
use crate::well_known::AuthWellKnownService;

async fn token_endpoint(well_known: &AuthWellKnownService) -> Result<String> {
    well_known
        .get_auth_well_known_endpoints()
        .await?
        .token_endpoint
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AuthError::TokenExchange("token endpoint not defined".into()))
}

fn parse_token_response(body: Value) -> Result<AuthResult> {
    serde_json::from_value(body)
        .map_err(|err| AuthError::TokenExchange(format!("invalid token response: {err}")))
}

/// Exchanges an authorization code for tokens.
///
/// A context that already carries an STS error passes through untouched so
/// the error check can report it.
pub struct CodeRequestStage {
    flows_data: Arc<FlowsDataService>,
    url: Arc<UrlService>,
    well_known: Arc<AuthWellKnownService>,
    transport: Arc<dyn OidcTransport>,
    tokens: Arc<TokenValidationService>,
}

impl CodeRequestStage {
    pub fn new(
        flows_data: Arc<FlowsDataService>,
        url: Arc<UrlService>,
        well_known: Arc<AuthWellKnownService>,
        transport: Arc<dyn OidcTransport>,
        tokens: Arc<TokenValidationService>,
    ) -> Self {
        Self { flows_data, url, well_known, transport, tokens }
    }
}

#[async_trait]
impl CallbackStage for CodeRequestStage {
    fn name(&self) -> &'static str {
        "code_request"
    }

    #[instrument(skip(self, context), fields(is_renew = context.is_renew_process))]
    async fn run(&self, mut context: CallbackContext) -> Result<CallbackContext> {
        if context.auth_error().is_some() {
            return Ok(context);
        }

        let local_state = self.flows_data.auth_state_control();
        if !self
            .tokens
            .validate_state_from_hash_callback(context.state.as_deref(), local_state.as_deref())
        {
            warn!("code request: incorrect state");
            return Err(AuthError::StateValidation(ValidationResult::StatesDoNotMatch));
        }

        let code = context.code.clone().filter(|code| !code.is_empty()).ok_or_else(|| {
            AuthError::TokenExchange("no code in the callback".into())
        })?;
        let endpoint = token_endpoint(&self.well_known).await?;
        let body = self.url.create_body_for_code_flow_code_request(&code)?;

        let response = self
            .transport
            .post_form(&endpoint, &body)
            .await
            .map_err(|err| AuthError::TokenExchange(err.to_string()))?;

        let mut auth_result = parse_token_response(response)?;
        auth_result.state = context.state.clone();
        auth_result.session_state = context.session_state.clone();
        debug!("authorization code exchanged");
        context.set_auth_result(auth_result)?;
        Ok(context)
    }
}

/// Runs the refresh-token grant, merging call-site custom params into the
/// form. Built per renewal since the params differ per call.
pub struct RefreshTokenRequestStage {
    url: Arc<UrlService>,
    well_known: Arc<AuthWellKnownService>,
    transport: Arc<dyn OidcTransport>,
    custom_params: CustomParams,
}

impl RefreshTokenRequestStage {
    pub fn new(
        url: Arc<UrlService>,
        well_known: Arc<AuthWellKnownService>,
        transport: Arc<dyn OidcTransport>,
        custom_params: CustomParams,
    ) -> Self {
        Self { url, well_known, transport, custom_params }
    }
}

#[async_trait]
impl CallbackStage for RefreshTokenRequestStage {
    fn name(&self) -> &'static str {
        "refresh_token_request"
    }

    async fn run(&self, mut context: CallbackContext) -> Result<CallbackContext> {
        let refresh_token = context
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::TokenExchange("no refresh token found".into()))?;
        let endpoint = token_endpoint(&self.well_known).await?;
        let body = self
            .url
            .create_body_for_code_flow_refresh_tokens_request(&refresh_token, &self.custom_params);

        let response = self
            .transport
            .post_form(&endpoint, &body)
            .await
            .map_err(|err| AuthError::TokenExchange(err.to_string()))?;

        let mut auth_result = parse_token_response(response)?;
        auth_result.state = context.state.clone();
        debug!("refresh token grant succeeded");
        context.set_auth_result(auth_result)?;
        Ok(context)
    }
}
