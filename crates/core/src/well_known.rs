//! Discovery document retrieval and caching

use std::sync::Arc;

use authlane_domain::constants::storage_keys;
use authlane_domain::{AuthError, AuthWellKnownEndpoints, Result};
use tracing::{debug, instrument};

use crate::config_provider::ConfigurationProvider;
use crate::ports::OidcTransport;
use crate::state::StoragePersistence;

/// Loads the issuer's discovery document once and serves it from storage.
pub struct AuthWellKnownService {
    storage: StoragePersistence,
    transport: Arc<dyn OidcTransport>,
    config: Arc<ConfigurationProvider>,
}

impl AuthWellKnownService {
    pub fn new(
        storage: StoragePersistence,
        transport: Arc<dyn OidcTransport>,
        config: Arc<ConfigurationProvider>,
    ) -> Self {
        Self { storage, transport, config }
    }

    /// Cached endpoints, if discovery already ran.
    #[must_use]
    pub fn stored_endpoints(&self) -> Option<AuthWellKnownEndpoints> {
        self.storage.read(storage_keys::AUTH_WELL_KNOWN_ENDPOINTS)
    }

    /// Endpoints for the configured issuer, fetching them on first use.
    ///
    /// # Errors
    /// `AuthError::Config` when no discovery address is configured, or the
    /// transport error when the document cannot be fetched.
    pub async fn get_auth_well_known_endpoints(&self) -> Result<AuthWellKnownEndpoints> {
        if let Some(endpoints) = self.stored_endpoints() {
            return Ok(endpoints);
        }
        let url = self
            .config
            .get()
            .well_known_url()
            .ok_or_else(|| AuthError::Config("no auth well-known endpoint configured".into()))?;
        self.query_and_store(&url).await
    }

    /// Fetch the discovery document at `url` and cache it.
    #[instrument(skip(self))]
    pub async fn query_and_store(&self, url: &str) -> Result<AuthWellKnownEndpoints> {
        let document = self.transport.get_json(url, None).await?;
        let endpoints: AuthWellKnownEndpoints = serde_json::from_value(document)
            .map_err(|err| AuthError::Transport(format!("invalid discovery document: {err}")))?;
        debug!(issuer = ?endpoints.issuer, "storing well-known endpoints");
        self.storage.write(storage_keys::AUTH_WELL_KNOWN_ENDPOINTS, &endpoints)?;
        Ok(endpoints)
    }
}
