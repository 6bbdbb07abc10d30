use std::sync::Arc;

use authlane_common::url_params::{param, query_params};
use authlane_domain::{
    AuthError, AuthorizationResult, CallbackContext, Result, ValidationResult,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};

use super::{IntervalScheduler, RenewGeneration};
use crate::callback::FlowsService;
use crate::config_provider::ConfigurationProvider;
use crate::reset::ResetAuthDataService;
use crate::state::{AuthStateService, FlowsDataService};

const COMPLETION_CAPACITY: usize = 16;

/// Redirect URL posted back by the renew frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilentRenewMessage {
    /// Generation the frame was loaded with
    pub generation: u64,
    pub url: String,
}

/// Result of one frame-based renewal; `context` is `None` on failure.
#[derive(Debug, Clone)]
pub struct RenewCompletion {
    pub generation: u64,
    pub context: Option<CallbackContext>,
}

/// Completes frame-based renewals.
pub struct SilentRenewService {
    config: Arc<ConfigurationProvider>,
    flows: Arc<FlowsService>,
    flows_data: Arc<FlowsDataService>,
    auth_state: Arc<AuthStateService>,
    reset: Arc<ResetAuthDataService>,
    scheduler: Arc<IntervalScheduler>,
    generation: RenewGeneration,
    completed: broadcast::Sender<RenewCompletion>,
}

impl SilentRenewService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ConfigurationProvider>,
        flows: Arc<FlowsService>,
        flows_data: Arc<FlowsDataService>,
        auth_state: Arc<AuthStateService>,
        reset: Arc<ResetAuthDataService>,
        scheduler: Arc<IntervalScheduler>,
        generation: RenewGeneration,
    ) -> Self {
        Self {
            config,
            flows,
            flows_data,
            auth_state,
            reset,
            scheduler,
            generation,
            completed: broadcast::channel(COMPLETION_CAPACITY).0,
        }
    }

    /// Completions of frame-based renewals, in order.
    #[must_use]
    pub fn subscribe_completed(&self) -> broadcast::Receiver<RenewCompletion> {
        self.completed.subscribe()
    }

    /// Process the renew frame's redirect.
    ///
    /// Messages from an abandoned attempt are dropped and yield `Ok(None)`.
    /// Otherwise the matching flow runs as a renewal, the outcome is
    /// broadcast and the renewal flag is released.
    ///
    /// # Errors
    /// The flow's failure, after the periodic check was stopped.
    #[instrument(skip(self, message), fields(generation = message.generation))]
    pub async fn handle_message(
        &self,
        message: SilentRenewMessage,
    ) -> Result<Option<CallbackContext>> {
        if !self.generation.is_current(message.generation) {
            let current = self.generation.current();
            debug!(current, "ignoring message from a stale renew attempt");
            return Ok(None);
        }

        let outcome = if self.config.flow_type().is_code_flow() {
            self.code_flow_callback_silent_renew_iframe(&message.url).await
        } else {
            self.flows.process_implicit_flow_callback(&message.url, true).await
        };

        if let Err(err) = &outcome {
            error!(error = %err, "silent renew failed");
            self.scheduler.stop_periodic_token_check();
        }

        self.flows_data.reset_silent_renew_running();
        let completion = RenewCompletion {
            generation: message.generation,
            context: outcome.as_ref().ok().cloned(),
        };
        if self.completed.send(completion).is_err() {
            debug!("no one is waiting for the renew completion");
        }
        outcome.map(Some)
    }

    async fn code_flow_callback_silent_renew_iframe(&self, url: &str) -> Result<CallbackContext> {
        let params = query_params(url);
        if let Some(error) = param(&params, "error") {
            warn!(error, "silent renew returned an error");
            self.auth_state.update_and_publish_auth_state(AuthorizationResult::unauthorized(
                ValidationResult::LoginRequired,
                true,
            ));
            self.reset.reset_authorization_data();
            if let Err(err) = self.flows_data.set_nonce("") {
                warn!(error = %err, "failed to clear nonce");
            }
            return Err(AuthError::Protocol {
                error: error.to_string(),
                description: param(&params, "error_description").map(str::to_string),
            });
        }

        let context = CallbackContext {
            code: param(&params, "code").map(str::to_string),
            state: param(&params, "state").map(str::to_string),
            session_state: param(&params, "session_state").map(str::to_string),
            is_renew_process: true,
            ..CallbackContext::default()
        };
        self.flows.process_silent_renew_code_flow_callback(context).await
    }
}
