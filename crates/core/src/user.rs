//! User data retrieval and caching

use std::sync::Arc;

use authlane_domain::constants::storage_keys;
use authlane_domain::{AuthError, FlowType, Result};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::config_provider::ConfigurationProvider;
use crate::ports::OidcTransport;
use crate::state::StoragePersistence;
use crate::well_known::AuthWellKnownService;

/// Cached user data and the user-info call.
pub struct UserService {
    storage: StoragePersistence,
    config: Arc<ConfigurationProvider>,
    well_known: Arc<AuthWellKnownService>,
    transport: Arc<dyn OidcTransport>,
    user_data: watch::Sender<Option<Value>>,
}

impl UserService {
    pub fn new(
        storage: StoragePersistence,
        config: Arc<ConfigurationProvider>,
        well_known: Arc<AuthWellKnownService>,
        transport: Arc<dyn OidcTransport>,
    ) -> Self {
        let cached = storage.read(storage_keys::USER_DATA);
        Self { storage, config, well_known, transport, user_data: watch::channel(cached).0 }
    }

    #[must_use]
    pub fn get_user_data_from_store(&self) -> Option<Value> {
        self.storage.read::<Value>(storage_keys::USER_DATA).filter(|data| !is_empty(data))
    }

    pub fn set_user_data_to_store(&self, data: Value) -> Result<()> {
        self.storage.write(storage_keys::USER_DATA, &data)?;
        self.user_data.send_replace(Some(data));
        Ok(())
    }

    pub fn reset_user_data_in_store(&self) {
        self.storage.remove_logged(storage_keys::USER_DATA);
        self.user_data.send_replace(None);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.user_data.subscribe()
    }

    /// Resolve user data for a freshly validated id-token and persist it.
    ///
    /// Flows without an access token use the id-token claims directly.
    /// Otherwise the user-info endpoint is called unless cached data exists
    /// and this is a renewal that does not refresh it. `Ok(None)` means the
    /// STS returned nothing usable, including a `sub` mismatch.
    ///
    /// # Errors
    /// The transport error when the user-info call fails.
    #[instrument(skip(self, decoded_id_token))]
    pub async fn get_and_persist_user_data_in_store(
        &self,
        is_renew_process: bool,
        decoded_id_token: Option<&Value>,
    ) -> Result<Option<Value>> {
        let config = self.config.get();
        let existing = self.get_user_data_from_store();
        let flow = config.flow_type();
        let has_access_token = flow.is_code_flow()
            || (flow == FlowType::ImplicitFlow && config.response_type_includes_access_token());

        if !has_access_token {
            let Some(claims) = decoded_id_token.cloned() else {
                return Ok(None);
            };
            self.set_user_data_to_store(claims.clone())?;
            return Ok(Some(claims));
        }

        if is_renew_process && !config.renew_userinfo_after_token_renew && existing.is_some() {
            debug!("keeping cached user data after renew");
            return Ok(existing);
        }

        let user_data = self.fetch_user_info().await?;
        let id_token_sub = decoded_id_token.and_then(|claims| claims.get("sub"));
        if !user_data.as_ref().is_some_and(|data| subjects_match(id_token_sub, data.get("sub"))) {
            warn!("user data sub does not match sub in id_token, resetting");
            self.reset_user_data_in_store();
            return Ok(None);
        }

        if let Some(data) = user_data.clone() {
            self.set_user_data_to_store(data)?;
        }
        Ok(user_data)
    }

    async fn fetch_user_info(&self) -> Result<Option<Value>> {
        let endpoints = self.well_known.get_auth_well_known_endpoints().await?;
        let endpoint = endpoints
            .userinfo_endpoint
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                AuthError::Config("discovery document has no userinfo_endpoint".into())
            })?;
        let access_token = self.storage.access_token();

        let data = self.transport.get_json(&endpoint, access_token.as_deref()).await?;
        Ok(Some(data).filter(|data| !is_empty(data)))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn subjects_match(id_token_sub: Option<&Value>, user_sub: Option<&Value>) -> bool {
    match (id_token_sub, user_sub) {
        (Some(a), Some(b)) => sub_string(a) == sub_string(b),
        _ => false,
    }
}

fn sub_string(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}
