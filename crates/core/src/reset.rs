//! Local logout

use std::sync::Arc;

use tracing::debug;

use crate::config_provider::ConfigurationProvider;
use crate::state::{AuthStateService, FlowsDataService};
use crate::user::UserService;

/// Clears every piece of local authorization data.
pub struct ResetAuthDataService {
    config: Arc<ConfigurationProvider>,
    user: Arc<UserService>,
    flows_data: Arc<FlowsDataService>,
    auth_state: Arc<AuthStateService>,
}

impl ResetAuthDataService {
    pub fn new(
        config: Arc<ConfigurationProvider>,
        user: Arc<UserService>,
        flows_data: Arc<FlowsDataService>,
        auth_state: Arc<AuthStateService>,
    ) -> Self {
        Self { config, user, flows_data, auth_state }
    }

    /// Reset user data, flow data and stored tokens, and publish the
    /// unauthenticated state.
    pub fn reset_authorization_data(&self) {
        debug!("resetting authorization data");
        if self.config.get().auto_userinfo {
            self.user.reset_user_data_in_store();
        }
        self.flows_data.reset_storage_flow_data();
        self.auth_state.set_unauthorized_and_fire_event();
    }
}
