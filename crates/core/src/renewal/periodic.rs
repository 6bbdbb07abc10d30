use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use super::{IntervalScheduler, RenewalStrategies};
use crate::config_provider::ConfigurationProvider;
use crate::reset::ResetAuthDataService;
use crate::state::{AuthStateService, FlowsDataService};
use crate::user::UserService;

/// What one tick of the periodic check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to renew, or a renewal is already in flight.
    Skipped,
    /// Tokens expired with silent renew off; the session was reset and the
    /// check stopped.
    SilentRenewDisabled,
    /// A renewal was started (frame) or finished (refresh token).
    Renewed,
    /// The renewal failed and the flag was released.
    Failed,
}

/// Renews expired tokens on every tick of the scheduler.
pub struct PeriodicTokenCheck {
    config: Arc<ConfigurationProvider>,
    auth_state: Arc<AuthStateService>,
    flows_data: Arc<FlowsDataService>,
    user: Arc<UserService>,
    reset: Arc<ResetAuthDataService>,
    strategies: RenewalStrategies,
    scheduler: Arc<IntervalScheduler>,
}

impl PeriodicTokenCheck {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        auth_state: Arc<AuthStateService>,
        flows_data: Arc<FlowsDataService>,
        user: Arc<UserService>,
        reset: Arc<ResetAuthDataService>,
        strategies: RenewalStrategies,
        scheduler: Arc<IntervalScheduler>,
    ) -> Self {
        Self { config, auth_state, flows_data, user, reset, strategies, scheduler }
    }

    /// Start the check with `period_seconds`, or the configured
    /// `token_refresh_in_seconds`. Returns `false` if silent renew is off or
    /// a check is already running.
    pub fn start_token_validation_periodically(
        self: &Arc<Self>,
        period_seconds: Option<u64>,
    ) -> bool {
        if !self.config.get().silent_renew {
            debug!("silent renew is off, periodic token check not started");
            return false;
        }
        let seconds =
            period_seconds.unwrap_or_else(|| self.config.get().token_refresh_in_seconds).max(1);
        let period = Duration::from_secs(seconds);
        let Some(mut ticks) = self.scheduler.start_periodic_token_check(period) else {
            return false;
        };

        let check = Arc::clone(self);
        let consumer = tokio::spawn(async move {
            while ticks.next().await.is_some() {
                check.run_tick().await;
            }
            debug!("periodic token check consumer finished");
        });
        self.scheduler.attach_consumer(consumer);
        true
    }

    pub fn stop_token_validation_periodically(&self) {
        self.scheduler.stop_periodic_token_check();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_token_validation_running()
    }

    /// Evaluate the session once and renew it if a token expired.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> TickOutcome {
        if self.user.get_user_data_from_store().is_none() {
            debug!("no user data, skipping token check");
            return TickOutcome::Skipped;
        }
        if self.flows_data.is_silent_renew_running() {
            debug!("silent renew already running, skipping token check");
            return TickOutcome::Skipped;
        }
        if self.auth_state.stored_id_token().is_none() {
            return TickOutcome::Skipped;
        }
        if !self.auth_state.has_id_token_expired()
            && !self.auth_state.has_access_token_expired_if_expiry_exists()
        {
            return TickOutcome::Skipped;
        }

        let config = self.config.get();
        if !config.silent_renew {
            info!("tokens expired and silent renew is off, resetting session");
            self.reset.reset_authorization_data();
            self.scheduler.stop_periodic_token_check();
            return TickOutcome::SilentRenewDisabled;
        }

        if !self.flows_data.try_set_silent_renew_running() {
            return TickOutcome::Skipped;
        }

        debug!("tokens expired, starting silent renew");
        let strategy = self.strategies.select(config.flow_type());
        let params = self.flows_data.custom_request_params();
        match strategy.renew(&params).await {
            Ok(_) => {
                // Frame renewals release the flag when the redirect arrives.
                if strategy.completes_inline() {
                    self.flows_data.reset_silent_renew_running();
                }
                TickOutcome::Renewed
            }
            Err(err) => {
                error!(error = %err, "silent renew failed on periodic check");
                self.flows_data.reset_silent_renew_running();
                TickOutcome::Failed
            }
        }
    }
}
