//! Issuer signing key retrieval

use std::sync::Arc;

use authlane_domain::{AuthError, JwtKeys, Result};
use tracing::{debug, warn};

use crate::ports::OidcTransport;
use crate::well_known::AuthWellKnownService;

pub struct SigninKeyDataService {
    well_known: Arc<AuthWellKnownService>,
    transport: Arc<dyn OidcTransport>,
}

impl SigninKeyDataService {
    pub fn new(well_known: Arc<AuthWellKnownService>, transport: Arc<dyn OidcTransport>) -> Self {
        Self { well_known, transport }
    }

    /// Fetch the issuer's current JWKS.
    ///
    /// # Errors
    /// Always `AuthError::KeyRetrieval`: no `jwks_uri`, a failed request, or
    /// an empty key set.
    pub async fn get_signing_keys(&self) -> Result<JwtKeys> {
        let endpoints = self
            .well_known
            .get_auth_well_known_endpoints()
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?;
        let Some(jwks_uri) = endpoints.jwks_uri.filter(|uri| !uri.is_empty()) else {
            warn!("discovery document has no jwks_uri");
            return Err(AuthError::KeyRetrieval("no jwks_uri in the discovery document".into()));
        };

        debug!(jwks_uri, "fetching signing keys");
        let document = self
            .transport
            .get_json(&jwks_uri, None)
            .await
            .map_err(|err| AuthError::KeyRetrieval(err.to_string()))?;
        let keys: JwtKeys = serde_json::from_value(document)
            .map_err(|err| AuthError::KeyRetrieval(format!("invalid key set: {err}")))?;
        if keys.is_empty() {
            return Err(AuthError::KeyRetrieval("issuer returned an empty key set".into()));
        }
        Ok(keys)
    }
}
