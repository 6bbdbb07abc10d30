//! Authorize, token request and end-session URL construction

use std::sync::Arc;

use authlane_common::generate_code_challenge;
use authlane_common::url_params::append_query;
use authlane_domain::{AuthError, CustomParams, OpenIdConfiguration, Result};
use tracing::{debug, error};

use crate::config_provider::ConfigurationProvider;
use crate::state::FlowsDataService;
use crate::well_known::AuthWellKnownService;

pub struct UrlService {
    config: Arc<ConfigurationProvider>,
    flows_data: Arc<FlowsDataService>,
    well_known: Arc<AuthWellKnownService>,
}

impl UrlService {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        flows_data: Arc<FlowsDataService>,
        well_known: Arc<AuthWellKnownService>,
    ) -> Self {
        Self { config, flows_data, well_known }
    }

    /// Authorize URL for an interactive login.
    ///
    /// Generates and stores a fresh `state` and `nonce` (and a PKCE
    /// verifier for the code flow).
    ///
    /// # Errors
    /// `AuthError::Config` when no authorization endpoint is known.
    pub async fn get_authorize_url(&self, custom_params: Option<&CustomParams>) -> Result<String> {
        let config = self.config.get();
        self.create_authorize_url(&config, &config.redirect_url, None, custom_params).await
    }

    /// Authorize URL for the hidden renew frame: `prompt=none` and the
    /// silent-renew redirect target.
    ///
    /// # Errors
    /// `AuthError::Config` when no `silent_renew_url` or authorization
    /// endpoint is available.
    pub async fn get_refresh_session_silent_renew_url(
        &self,
        custom_params: Option<&CustomParams>,
    ) -> Result<String> {
        let config = self.config.get();
        let redirect = config
            .silent_renew_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::Config("silent_renew_url is not configured".into()))?;
        self.create_authorize_url(&config, &redirect, Some("none"), custom_params).await
    }

    /// Form body for exchanging an authorization code.
    ///
    /// # Errors
    /// `AuthError::TokenExchange` when no PKCE verifier is stored.
    pub fn create_body_for_code_flow_code_request(
        &self,
        code: &str,
    ) -> Result<Vec<(String, String)>> {
        let config = self.config.get();
        let verifier = self.flows_data.code_verifier().ok_or_else(|| {
            error!("code verifier is not set in storage");
            AuthError::TokenExchange("code verifier is not set".into())
        })?;

        let redirect_uri = match config.silent_renew_url.as_deref() {
            Some(url) if self.flows_data.is_silent_renew_running() && !url.is_empty() => url,
            _ => config.redirect_url.as_str(),
        };

        Ok(vec![
            ("grant_type".into(), "authorization_code".into()),
            ("client_id".into(), config.client_id.clone()),
            ("code_verifier".into(), verifier),
            ("code".into(), code.to_string()),
            ("redirect_uri".into(), redirect_uri.to_string()),
        ])
    }

    /// Form body for the refresh-token grant.
    #[must_use]
    pub fn create_body_for_code_flow_refresh_tokens_request(
        &self,
        refresh_token: &str,
        custom_params: &CustomParams,
    ) -> Vec<(String, String)> {
        let config = self.config.get();
        let mut body = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_id".to_string(), config.client_id),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        body.extend(custom_params.iter().map(|(key, value)| (key.clone(), value.to_string())));
        body
    }

    /// End-session URL with `id_token_hint` and the post-logout redirect.
    ///
    /// `None` when the issuer publishes no end-session endpoint.
    pub async fn create_end_session_url(&self, id_token_hint: Option<&str>) -> Option<String> {
        let endpoints = self.well_known.get_auth_well_known_endpoints().await.ok()?;
        let endpoint = endpoints.end_session_endpoint.filter(|url| !url.is_empty())?;
        let config = self.config.get();

        let mut params = Vec::new();
        if let Some(hint) = id_token_hint {
            params.push(("id_token_hint", hint.to_string()));
        }
        if let Some(redirect) = config.post_logout_redirect_uri.filter(|url| !url.is_empty()) {
            params.push(("post_logout_redirect_uri", redirect));
        }
        Some(append_query(&endpoint, params))
    }

    async fn create_authorize_url(
        &self,
        config: &OpenIdConfiguration,
        redirect_url: &str,
        prompt: Option<&str>,
        custom_params: Option<&CustomParams>,
    ) -> Result<String> {
        let endpoints = self.well_known.get_auth_well_known_endpoints().await?;
        let authorization_endpoint = endpoints
            .authorization_endpoint
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                error!("discovery document has no authorization_endpoint");
                AuthError::Config("authorization endpoint not available".into())
            })?;

        let state = self.flows_data.get_existing_or_create_auth_state_control()?;
        let nonce = self.flows_data.create_nonce()?;
        debug!("authorize request state and nonce stored");

        let mut params = vec![
            ("client_id", config.client_id.clone()),
            ("redirect_uri", redirect_url.to_string()),
            ("response_type", config.response_type.clone()),
            ("scope", config.scope.clone()),
            ("nonce", nonce),
            ("state", state),
        ];

        if config.flow_type().is_code_flow() {
            let verifier = self.flows_data.create_code_verifier()?;
            params.push(("code_challenge", generate_code_challenge(&verifier)));
            params.push(("code_challenge_method", "S256".to_string()));
        }
        if let Some(prompt) = prompt {
            params.push(("prompt", prompt.to_string()));
        }

        // Call-site params override static ones with the same key.
        let mut merged = config.custom_params.clone();
        if let Some(extra) = custom_params {
            merged.extend(extra.clone());
        }
        let url = append_query(&authorization_endpoint, params);
        Ok(append_query(
            &url,
            merged.iter().map(|(key, value)| (key.as_str(), value.to_string())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use authlane_common::url_params::{param, query_params};
    use authlane_domain::{CustomParamValue, OpenIdConfiguration};

    use super::*;
    use crate::state::StoragePersistence;
    use crate::testing::{well_known_document, MockStorage, MockTransport};

    fn service(config: OpenIdConfiguration) -> (UrlService, Arc<FlowsDataService>) {
        let transport = Arc::new(MockTransport::new());
        transport.on_get(
            "https://sts.example.com/.well-known/openid-configuration",
            Ok(well_known_document("https://sts.example.com")),
        );
        let storage = StoragePersistence::new(Arc::new(MockStorage::new()));
        let config = Arc::new(ConfigurationProvider::new(OpenIdConfiguration {
            sts_server: "https://sts.example.com".into(),
            client_id: "spa".into(),
            redirect_url: "https://app.example.com/".into(),
            silent_renew_url: Some("https://app.example.com/silent-renew.html".into()),
            post_logout_redirect_uri: Some("https://app.example.com/bye".into()),
            ..config
        }));
        let flows_data = Arc::new(FlowsDataService::new(storage.clone()));
        let well_known =
            Arc::new(AuthWellKnownService::new(storage, transport, Arc::clone(&config)));
        (UrlService::new(config, Arc::clone(&flows_data), well_known), flows_data)
    }

    #[tokio::test]
    async fn authorize_url_carries_pkce_state_and_nonce() {
        let (service, flows_data) = service(OpenIdConfiguration::default());
        let url = service.get_authorize_url(None).await.unwrap();
        let params = query_params(&url);

        assert!(url.starts_with("https://sts.example.com/connect/authorize?"));
        assert_eq!(param(&params, "client_id"), Some("spa"));
        assert_eq!(param(&params, "state"), flows_data.auth_state_control().as_deref());
        assert_eq!(param(&params, "nonce"), flows_data.auth_nonce().as_deref());
        assert_eq!(param(&params, "code_challenge_method"), Some("S256"));
        let verifier = flows_data.code_verifier().unwrap();
        let challenge = generate_code_challenge(&verifier);
        assert_eq!(param(&params, "code_challenge"), Some(challenge.as_str()));
        assert_eq!(param(&params, "prompt"), None);
    }

    #[tokio::test]
    async fn silent_renew_url_uses_prompt_none_and_merged_params() {
        let mut static_params = CustomParams::new();
        static_params.insert("ui_locales".into(), CustomParamValue::from("en"));
        let (service, _) = service(OpenIdConfiguration {
            custom_params: static_params,
            ..OpenIdConfiguration::default()
        });

        let mut extra = CustomParams::new();
        extra.insert("ui_locales".into(), CustomParamValue::from("de"));
        let url = service.get_refresh_session_silent_renew_url(Some(&extra)).await.unwrap();
        let params = query_params(&url);

        assert_eq!(param(&params, "prompt"), Some("none"));
        assert_eq!(
            param(&params, "redirect_uri"),
            Some("https://app.example.com/silent-renew.html")
        );
        assert_eq!(param(&params, "ui_locales"), Some("de"));
    }

    #[tokio::test]
    async fn implicit_flow_has_no_pkce() {
        let (service, flows_data) = service(OpenIdConfiguration {
            response_type: "id_token token".into(),
            ..OpenIdConfiguration::default()
        });
        let url = service.get_authorize_url(None).await.unwrap();

        assert_eq!(param(&query_params(&url), "code_challenge"), None);
        assert!(flows_data.code_verifier().is_none());
    }

    #[test]
    fn code_request_requires_verifier() {
        let (service, flows_data) = service(OpenIdConfiguration::default());
        assert!(matches!(
            service.create_body_for_code_flow_code_request("c"),
            Err(AuthError::TokenExchange(_))
        ));

        flows_data.create_code_verifier().unwrap();
        let body = service.create_body_for_code_flow_code_request("c").unwrap();
        assert!(body.contains(&("code".into(), "c".into())));
        assert!(body.contains(&("redirect_uri".into(), "https://app.example.com/".into())));
    }

    #[test]
    fn code_request_during_renew_targets_silent_renew_url() {
        let (service, flows_data) = service(OpenIdConfiguration::default());
        flows_data.create_code_verifier().unwrap();
        assert!(flows_data.try_set_silent_renew_running());

        let body = service.create_body_for_code_flow_code_request("c").unwrap();
        assert!(body.contains(&(
            "redirect_uri".into(),
            "https://app.example.com/silent-renew.html".into()
        )));
    }

    #[tokio::test]
    async fn end_session_url_includes_hint_and_redirect() {
        let (service, _) = service(OpenIdConfiguration::default());
        let url = service.create_end_session_url(Some("id.token.value")).await.unwrap();
        let params = query_params(&url);

        assert_eq!(param(&params, "id_token_hint"), Some("id.token.value"));
        assert_eq!(param(&params, "post_logout_redirect_uri"), Some("https://app.example.com/bye"));
    }
}
