use std::sync::Arc;
use std::time::Duration;

use authlane_domain::constants::{MAX_RETRY_ATTEMPTS, RETRY_SCALING_MILLIS};
use authlane_domain::{AuthError, CallbackContext, CustomParams, FlowType, Result, SessionTokens};
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};

use super::silent_renew::RenewCompletion;
use super::{RenewalStrategies, SilentRenewService};
use crate::config_provider::ConfigurationProvider;
use crate::state::{AuthStateService, FlowsDataService};
use crate::well_known::AuthWellKnownService;

/// Caller-driven renewal.
pub struct RefreshSessionService {
    config: Arc<ConfigurationProvider>,
    auth_state: Arc<AuthStateService>,
    flows_data: Arc<FlowsDataService>,
    well_known: Arc<AuthWellKnownService>,
    strategies: RenewalStrategies,
    silent_renew: Arc<SilentRenewService>,
}

impl RefreshSessionService {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        auth_state: Arc<AuthStateService>,
        flows_data: Arc<FlowsDataService>,
        well_known: Arc<AuthWellKnownService>,
        strategies: RenewalStrategies,
        silent_renew: Arc<SilentRenewService>,
    ) -> Self {
        Self { config, auth_state, flows_data, well_known, strategies, silent_renew }
    }

    /// Renew the session now.
    ///
    /// Returns `Ok(None)` without doing anything when a renewal is already
    /// in flight or no discovery address is configured, and `Ok(None)` when
    /// the renewal finished but the stored tokens are not valid. A
    /// frame-based renewal that does not complete within
    /// `silent_renew_timeout_in_seconds` is retried up to
    /// [`MAX_RETRY_ATTEMPTS`] times, waiting `attempt` seconds before each.
    ///
    /// # Errors
    /// `AuthError::Timeout` once retries are exhausted; any other failure
    /// immediately and unchanged.
    #[instrument(skip(self, custom_params))]
    pub async fn force_refresh_session(
        &self,
        custom_params: Option<&CustomParams>,
    ) -> Result<Option<SessionTokens>> {
        let params = custom_params.cloned().unwrap_or_default();
        let config = self.config.get();

        if config.flow_type() == FlowType::CodeFlowWithRefreshTokens {
            return self.refresh_with_refresh_token(&params).await;
        }

        let timeout = Duration::from_secs(config.silent_renew_timeout_in_seconds);
        let mut attempt: u32 = 0;
        loop {
            match self.refresh_with_iframe(&params, timeout).await {
                Err(err) if err.is_timeout() => {
                    self.flows_data.reset_silent_renew_running();
                    attempt += 1;
                    if attempt > MAX_RETRY_ATTEMPTS {
                        warn!(attempts = attempt, "force refresh session timed out, giving up");
                        return Err(err);
                    }
                    debug!(attempt, "force refresh session timed out, retrying");
                    let backoff = u64::from(attempt) * RETRY_SCALING_MILLIS;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                other => return other,
            }
        }
    }

    async fn refresh_with_refresh_token(
        &self,
        params: &CustomParams,
    ) -> Result<Option<SessionTokens>> {
        if !self.begin_renewal().await? {
            return Ok(None);
        }
        let outcome = self.strategies.refresh_token().renew(params).await;
        self.flows_data.reset_silent_renew_running();
        outcome?;

        if !self.auth_state.are_auth_storage_tokens_valid() {
            debug!("tokens not valid after refresh");
            return Ok(None);
        }
        Ok(Some(SessionTokens {
            id_token: self.auth_state.get_id_token(),
            access_token: self.auth_state.get_access_token(),
        }))
    }

    async fn refresh_with_iframe(
        &self,
        params: &CustomParams,
        timeout: Duration,
    ) -> Result<Option<SessionTokens>> {
        // Subscribe before the frame loads so the completion cannot be missed.
        let mut completed = self.silent_renew.subscribe_completed();
        if !self.begin_renewal().await? {
            return Ok(None);
        }

        let iframe = self.strategies.iframe();
        let generation = iframe.next_generation();
        let params = (!params.is_empty()).then_some(params);

        let joined = tokio::time::timeout(timeout, async {
            tokio::try_join!(
                iframe.dispatch(generation, params),
                wait_for_completion(&mut completed, generation)
            )
        })
        .await;

        match joined {
            Err(_) => {
                // A completion arriving after this point belongs to nobody.
                iframe.next_generation();
                Err(AuthError::Timeout { seconds: timeout.as_secs() })
            }
            Ok(Err(err)) => {
                self.flows_data.reset_silent_renew_running();
                Err(err)
            }
            Ok(Ok(((), context))) => Ok(self.session_tokens_from(context.as_ref())),
        }
    }

    /// Check the guard, make sure discovery ran, then claim the renewal
    /// flag. `false` means nothing should happen.
    async fn begin_renewal(&self) -> Result<bool> {
        if self.flows_data.is_silent_renew_running() {
            debug!("silent renew already running, nothing to do");
            return Ok(false);
        }
        if self.config.get().well_known_url().is_none() {
            error!("could not refresh session, no auth well-known endpoint given");
            return Ok(false);
        }
        self.well_known.get_auth_well_known_endpoints().await?;
        Ok(self.flows_data.try_set_silent_renew_running())
    }

    fn session_tokens_from(&self, context: Option<&CallbackContext>) -> Option<SessionTokens> {
        if !self.auth_state.are_auth_storage_tokens_valid() {
            return None;
        }
        let auth_result = context?.auth_result.as_ref()?;
        Some(SessionTokens {
            id_token: auth_result.id_token.clone(),
            access_token: auth_result.access_token.clone(),
        })
    }
}

async fn wait_for_completion(
    completed: &mut broadcast::Receiver<RenewCompletion>,
    generation: u64,
) -> Result<Option<CallbackContext>> {
    loop {
        match completed.recv().await {
            Ok(completion) if completion.generation == generation => return Ok(completion.context),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed renew completions");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(AuthError::Internal("renew completion channel closed".into()));
            }
        }
    }
}
