use std::sync::Arc;

use authlane_common::jwt::JwtParts;
use authlane_domain::{
    CallbackContext, FlowType, JwtKeys, OpenIdConfiguration, StateValidationResult,
    ValidationResult,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::TokenValidationService;
use crate::config_provider::ConfigurationProvider;
use crate::ports::TokenSignatureVerifier;
use crate::state::FlowsDataService;
use crate::well_known::AuthWellKnownService;

/// Validates a callback's `state`, id-token signature and claims.
pub struct StateValidationService {
    config: Arc<ConfigurationProvider>,
    flows_data: Arc<FlowsDataService>,
    well_known: Arc<AuthWellKnownService>,
    verifier: Arc<dyn TokenSignatureVerifier>,
    tokens: TokenValidationService,
}

impl StateValidationService {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        flows_data: Arc<FlowsDataService>,
        well_known: Arc<AuthWellKnownService>,
        verifier: Arc<dyn TokenSignatureVerifier>,
        tokens: TokenValidationService,
    ) -> Self {
        Self { config, flows_data, well_known, verifier, tokens }
    }

    /// Validate the context's authorization result.
    ///
    /// Never fails; a rejected response is reported through
    /// `auth_response_is_valid` and the validation code. The stored nonce
    /// (and state) are cleared either way.
    pub fn get_validated_state_result(&self, context: &CallbackContext) -> StateValidationResult {
        let result = self.validate(context);
        self.clear_request_values();
        result
    }

    fn validate(&self, context: &CallbackContext) -> StateValidationResult {
        let config = self.config.get();
        let Some(auth_result) = context.auth_result.as_ref() else {
            return StateValidationResult::rejected(ValidationResult::StatesDoNotMatch);
        };

        let local_state = self.flows_data.auth_state_control();
        if !self
            .tokens
            .validate_state_from_hash_callback(auth_result.state.as_deref(), local_state.as_deref())
        {
            warn!("authorized callback: state does not match");
            return StateValidationResult::rejected(ValidationResult::StatesDoNotMatch);
        }

        let flow = config.flow_type();
        let carries_access_token = flow.is_code_flow()
            || (flow == FlowType::ImplicitFlow && config.response_type_includes_access_token());

        let mut result = StateValidationResult::default();
        if carries_access_token {
            result.access_token = auth_result.access_token.clone().unwrap_or_default();
        }

        let Some(id_token) = auth_result.id_token.clone().filter(|token| !token.is_empty()) else {
            info!("no id_token found, skipping id_token validation");
            return accept(result);
        };

        let parts = match JwtParts::decode(&id_token) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(error = %err, "id token could not be decoded");
                return StateValidationResult::rejected(ValidationResult::SignatureFailed);
            }
        };
        result.id_token = id_token;
        result.decoded_id_token = Some(parts.payload.clone());

        let keys = context.jwt_keys.clone().unwrap_or_default();
        if let Some(failure) = self.check_id_token(context, &config, &parts, &keys) {
            result.state = failure;
            return result;
        }

        if carries_access_token {
            if let Some(failure) = self.check_at_hash(&result.access_token, &parts, flow) {
                result.state = failure;
                return result;
            }
        }

        accept(result)
    }

    fn check_id_token(
        &self,
        context: &CallbackContext,
        config: &OpenIdConfiguration,
        parts: &JwtParts,
        keys: &JwtKeys,
    ) -> Option<ValidationResult> {
        let claims = &parts.payload;
        let id_token =
            context.auth_result.as_ref().and_then(|r| r.id_token.as_deref()).unwrap_or_default();

        if !self.verifier.verify(id_token, keys) {
            debug!("id token signature could not be verified");
            return Some(ValidationResult::SignatureFailed);
        }

        let nonce = self.flows_data.auth_nonce();
        let ignore_after_refresh = config.ignore_nonce_after_refresh;
        if !self.tokens.validate_id_token_nonce(claims, nonce.as_deref(), ignore_after_refresh) {
            warn!("id token nonce does not match the stored nonce");
            return Some(ValidationResult::IncorrectNonce);
        }

        if !self.tokens.validate_required_id_token(claims) {
            debug!("required id token properties are missing");
            return Some(ValidationResult::RequiredPropertyMissing);
        }

        if !self.tokens.validate_id_token_iat_max_offset(
            claims,
            config.max_id_token_iat_offset_allowed_in_seconds,
            config.disable_iat_offset_validation,
        ) {
            warn!("id token iat is outside the allowed offset");
            return Some(ValidationResult::MaxOffsetExpired);
        }

        let Some(endpoints) = self.well_known.stored_endpoints() else {
            warn!("no well-known endpoints available to check the issuer");
            return Some(ValidationResult::NoAuthWellKnownEndPoints);
        };
        let issuer = endpoints.issuer.unwrap_or_default();
        if !self.tokens.validate_id_token_iss(claims, &issuer) {
            warn!(issuer, "id token iss does not match the issuer");
            return Some(ValidationResult::IssDoesNotMatchIssuer);
        }

        if !self.tokens.validate_id_token_aud(claims, &config.client_id) {
            warn!("id token aud does not contain the client id");
            return Some(ValidationResult::IncorrectAud);
        }

        if !self.tokens.validate_id_token_azp_exists_if_more_than_one_aud(claims)
            || !self.tokens.validate_id_token_azp_valid(claims, &config.client_id)
        {
            warn!("id token azp is missing or invalid");
            return Some(ValidationResult::IncorrectAzp);
        }

        if !self.is_id_token_after_refresh_valid(context, config, claims) {
            warn!("id token claims changed after refresh");
            return Some(ValidationResult::IncorrectIdTokenClaimsAfterRefresh);
        }

        if !self
            .tokens
            .validate_id_token_exp_not_expired(claims, config.silent_renew_offset_in_seconds)
        {
            warn!("id token has expired");
            return Some(ValidationResult::TokenExpired);
        }

        None
    }

    fn check_at_hash(
        &self,
        access_token: &str,
        parts: &JwtParts,
        flow: FlowType,
    ) -> Option<ValidationResult> {
        let alg = parts.alg().unwrap_or("RS256");
        // at_hash is optional for the code flow
        match parts.string_claim("at_hash") {
            None if flow.is_code_flow() => {
                debug!("code flow without at_hash, skipping check");
                None
            }
            Some(expected)
                if !access_token.is_empty()
                    && self.tokens.validate_id_token_at_hash(access_token, expected, alg) =>
            {
                None
            }
            _ => {
                warn!("access token does not match the id token at_hash");
                Some(ValidationResult::IncorrectAtHash)
            }
        }
    }

    fn is_id_token_after_refresh_valid(
        &self,
        context: &CallbackContext,
        config: &OpenIdConfiguration,
        claims: &Value,
    ) -> bool {
        if !config.use_refresh_token {
            return true;
        }
        let Some(previous) = context.existing_id_token.as_deref().filter(|t| !t.is_empty()) else {
            return true;
        };
        match JwtParts::decode(previous) {
            Ok(previous) => {
                self.tokens.validate_id_token_claims_after_refresh(claims, &previous.payload)
            }
            Err(_) => false,
        }
    }

    fn clear_request_values(&self) {
        if let Err(err) = self.flows_data.set_nonce("") {
            warn!(error = %err, "failed to clear nonce");
        }
        if let Err(err) = self.flows_data.set_auth_state_control("") {
            warn!(error = %err, "failed to clear state control");
        }
    }
}

fn accept(mut result: StateValidationResult) -> StateValidationResult {
    result.auth_response_is_valid = true;
    result.state = ValidationResult::Ok;
    result
}
