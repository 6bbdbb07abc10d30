//! Public entry point of the relying party
//!
//! [`OidcSecurityService`] wires every service together over the four ports
//! and exposes the operations a host application calls.

use std::sync::Arc;

use authlane_common::url_params::{fragment_params, param, query_params};
use authlane_common::Clock;
use authlane_domain::{
    AuthResult, AuthorizationResult, CallbackContext, CustomParams, OpenIdConfiguration, Result,
    SessionTokens,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::callback::{FlowsDependencies, FlowsService};
use crate::config_provider::ConfigurationProvider;
use crate::ports::{AuthStorage, NavigationSurface, OidcTransport, TokenSignatureVerifier};
use crate::renewal::{
    IframeRenewal, IntervalScheduler, PeriodicTokenCheck, RefreshSessionService,
    RefreshTokenRenewal, RenewCompletion, RenewGeneration, RenewalStrategies, SilentRenewMessage,
    SilentRenewService,
};
use crate::reset::ResetAuthDataService;
use crate::signing_keys::SigninKeyDataService;
use crate::state::{AuthStateService, FlowsDataService, StoragePersistence};
use crate::url::UrlService;
use crate::user::UserService;
use crate::validation::{StateValidationService, TokenValidationService};
use crate::well_known::AuthWellKnownService;

/// Adapters the relying party runs on.
pub struct OidcPorts {
    pub storage: Arc<dyn AuthStorage>,
    pub transport: Arc<dyn OidcTransport>,
    pub navigation: Arc<dyn NavigationSurface>,
    pub verifier: Arc<dyn TokenSignatureVerifier>,
    pub clock: Arc<dyn Clock>,
}

/// OpenID Connect relying party.
pub struct OidcSecurityService {
    config: Arc<ConfigurationProvider>,
    auth_state: Arc<AuthStateService>,
    flows_data: Arc<FlowsDataService>,
    user: Arc<UserService>,
    reset: Arc<ResetAuthDataService>,
    url: Arc<UrlService>,
    flows: Arc<FlowsService>,
    periodic: Arc<PeriodicTokenCheck>,
    refresh_session: RefreshSessionService,
    silent_renew: Arc<SilentRenewService>,
    navigation: Arc<dyn NavigationSurface>,
}

impl OidcSecurityService {
    /// Validate `config` and build the service graph.
    ///
    /// # Errors
    /// `AuthError::Config` when the configuration is unusable.
    pub fn new(config: OpenIdConfiguration, ports: OidcPorts) -> Result<Self> {
        config.validate()?;
        let OidcPorts { storage, transport, navigation, verifier, clock } = ports;

        let config = Arc::new(ConfigurationProvider::new(config));
        let storage = StoragePersistence::new(storage);
        let flows_data = Arc::new(FlowsDataService::new(storage.clone()));
        let auth_state = Arc::new(AuthStateService::new(
            storage.clone(),
            Arc::clone(&config),
            Arc::clone(&clock),
        ));
        let well_known = Arc::new(AuthWellKnownService::new(
            storage.clone(),
            Arc::clone(&transport),
            Arc::clone(&config),
        ));
        let signing_keys =
            Arc::new(SigninKeyDataService::new(Arc::clone(&well_known), Arc::clone(&transport)));
        let user = Arc::new(UserService::new(
            storage.clone(),
            Arc::clone(&config),
            Arc::clone(&well_known),
            Arc::clone(&transport),
        ));
        let reset = Arc::new(ResetAuthDataService::new(
            Arc::clone(&config),
            Arc::clone(&user),
            Arc::clone(&flows_data),
            Arc::clone(&auth_state),
        ));
        let url = Arc::new(UrlService::new(
            Arc::clone(&config),
            Arc::clone(&flows_data),
            Arc::clone(&well_known),
        ));
        let validation = Arc::new(StateValidationService::new(
            Arc::clone(&config),
            Arc::clone(&flows_data),
            Arc::clone(&well_known),
            verifier,
            TokenValidationService::new(Arc::clone(&clock)),
        ));

        let flows = Arc::new(FlowsService::new(FlowsDependencies {
            config: Arc::clone(&config),
            storage,
            flows_data: Arc::clone(&flows_data),
            auth_state: Arc::clone(&auth_state),
            reset: Arc::clone(&reset),
            user: Arc::clone(&user),
            url: Arc::clone(&url),
            well_known: Arc::clone(&well_known),
            signing_keys,
            validation,
            tokens: Arc::new(TokenValidationService::new(clock)),
            transport,
            navigation: Arc::clone(&navigation),
        }));

        let scheduler = Arc::new(IntervalScheduler::new());
        let generation = RenewGeneration::default();
        let strategies = RenewalStrategies::new(
            Arc::new(RefreshTokenRenewal::new(Arc::clone(&flows))),
            Arc::new(IframeRenewal::new(
                Arc::clone(&url),
                Arc::clone(&navigation),
                generation.clone(),
            )),
        );
        let silent_renew = Arc::new(SilentRenewService::new(
            Arc::clone(&config),
            Arc::clone(&flows),
            Arc::clone(&flows_data),
            Arc::clone(&auth_state),
            Arc::clone(&reset),
            Arc::clone(&scheduler),
            generation,
        ));
        let periodic = Arc::new(PeriodicTokenCheck::new(
            Arc::clone(&config),
            Arc::clone(&auth_state),
            Arc::clone(&flows_data),
            Arc::clone(&user),
            Arc::clone(&reset),
            strategies.clone(),
            scheduler,
        ));
        let refresh_session = RefreshSessionService::new(
            Arc::clone(&config),
            Arc::clone(&auth_state),
            Arc::clone(&flows_data),
            well_known,
            strategies,
            Arc::clone(&silent_renew),
        );

        Ok(Self {
            config,
            auth_state,
            flows_data,
            user,
            reset,
            url,
            flows,
            periodic,
            refresh_session,
            silent_renew,
            navigation,
        })
    }

    /// Start an interactive login: persist `custom_params` for later
    /// renewals and navigate to the authorize URL.
    ///
    /// # Errors
    /// Discovery, URL construction or navigation failures.
    #[instrument(skip(self, custom_params))]
    pub async fn authorize(&self, custom_params: Option<&CustomParams>) -> Result<()> {
        if let Some(params) = custom_params {
            self.flows_data.set_custom_request_params(params)?;
        }
        self.flows_data.reset_silent_renew_running();
        let url = self.url.get_authorize_url(custom_params).await?;
        info!("redirecting to the authorize endpoint");
        self.navigation.navigate(&url).await
    }

    /// Process a login redirect when `current_url` carries one, otherwise
    /// resume a persisted session. Starts periodic validation once
    /// authenticated with silent renew on. Returns whether the session is
    /// authenticated.
    ///
    /// # Errors
    /// Any callback pipeline failure.
    #[instrument(skip(self, current_url))]
    pub async fn check_auth(&self, current_url: Option<&str>) -> Result<bool> {
        match current_url.filter(|url| self.is_callback(url)) {
            Some(url) if self.config.flow_type().is_code_flow() => {
                self.flows.process_code_flow_callback(url).await?;
            }
            Some(url) => {
                self.flows.process_implicit_flow_callback(url, false).await?;
            }
            None => {
                self.auth_state.restore_persisted_session();
            }
        }

        let authenticated = self.auth_state.is_authenticated();
        if authenticated && self.config.get().silent_renew {
            self.start_periodic_validation(None);
        }
        debug!(authenticated, "check auth finished");
        Ok(authenticated)
    }

    /// Start the periodic token check. `false` if it was already running.
    pub fn start_periodic_validation(&self, period_seconds: Option<u64>) -> bool {
        self.periodic.start_token_validation_periodically(period_seconds)
    }

    pub fn stop_periodic_validation(&self) {
        self.periodic.stop_token_validation_periodically();
    }

    #[must_use]
    pub fn is_periodic_validation_running(&self) -> bool {
        self.periodic.is_running()
    }

    /// Renew now. `custom_params` are persisted so later periodic renewals
    /// reuse them. See [`RefreshSessionService::force_refresh_session`].
    ///
    /// # Errors
    /// Storage failure persisting `custom_params`, timeout after exhausted
    /// retries, or the renewal's failure.
    pub async fn force_refresh_session(
        &self,
        custom_params: Option<&CustomParams>,
    ) -> Result<Option<SessionTokens>> {
        if let Some(params) = custom_params {
            self.flows_data.set_custom_request_params(params)?;
        }
        self.refresh_session.force_refresh_session(custom_params).await
    }

    /// Run the shared callback stages over an already-parsed result.
    ///
    /// # Errors
    /// The first failing stage's error.
    pub async fn handle_callback(
        &self,
        auth_result: AuthResult,
        is_renew_process: bool,
        refresh_token: Option<String>,
    ) -> Result<CallbackContext> {
        self.flows.handle_callback(auth_result, is_renew_process, refresh_token).await
    }

    /// Deliver the renew frame's redirect.
    ///
    /// # Errors
    /// The renewal's failure.
    pub async fn handle_silent_renew_message(
        &self,
        message: SilentRenewMessage,
    ) -> Result<Option<CallbackContext>> {
        self.silent_renew.handle_message(message).await
    }

    #[must_use]
    pub fn subscribe_silent_renew_completed(
        &self,
    ) -> tokio::sync::broadcast::Receiver<RenewCompletion> {
        self.silent_renew.subscribe_completed()
    }

    #[must_use]
    pub fn get_access_token(&self) -> Option<String> {
        self.auth_state.get_access_token()
    }

    #[must_use]
    pub fn get_id_token(&self) -> Option<String> {
        self.auth_state.get_id_token()
    }

    #[must_use]
    pub fn get_refresh_token(&self) -> Option<String> {
        self.auth_state.get_refresh_token()
    }

    #[must_use]
    pub fn get_user_data(&self) -> Option<Value> {
        self.user.get_user_data_from_store()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_state.is_authenticated()
    }

    #[must_use]
    pub fn subscribe_auth_state(&self) -> watch::Receiver<AuthorizationResult> {
        self.auth_state.subscribe()
    }

    #[must_use]
    pub fn subscribe_authenticated(&self) -> watch::Receiver<bool> {
        self.auth_state.subscribe_authenticated()
    }

    #[must_use]
    pub fn subscribe_user_data(&self) -> watch::Receiver<Option<Value>> {
        self.user.subscribe()
    }

    /// Drop the local session without contacting the STS.
    pub fn logoff_local(&self) {
        info!("local logoff");
        self.reset.reset_authorization_data();
        self.periodic.stop_token_validation_periodically();
    }

    /// End-session URL for the current id token, if the issuer has one.
    pub async fn get_end_session_url(&self) -> Option<String> {
        let id_token = self.auth_state.stored_id_token();
        let url = self.url.create_end_session_url(id_token.as_deref()).await;
        if url.is_none() {
            warn!("no end session endpoint available");
        }
        url
    }

    #[must_use]
    pub fn configuration(&self) -> OpenIdConfiguration {
        self.config.get()
    }

    /// Toggle silent renew at runtime.
    pub fn set_silent_renew(&self, enabled: bool) {
        self.config.set_silent_renew(enabled);
    }

    fn is_callback(&self, url: &str) -> bool {
        if self.config.flow_type().is_code_flow() {
            let params = query_params(url);
            param(&params, "code").is_some() || param(&params, "error").is_some()
        } else {
            let params = fragment_params(url);
            ["id_token", "access_token", "error"].iter().any(|key| param(&params, key).is_some())
        }
    }
}
