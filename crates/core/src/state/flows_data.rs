use std::sync::atomic::{AtomicBool, Ordering};

use authlane_common::{generate_code_verifier, generate_nonce, generate_state};
use authlane_domain::constants::storage_keys;
use authlane_domain::{CustomParams, Result};
use tracing::debug;

use super::StoragePersistence;

/// Values tied to one authorize round trip, plus the renewal flag.
///
/// The flag is the only guard against two renewals running at once; it is
/// set with a compare-and-swap so concurrent callers cannot both win.
pub struct FlowsDataService {
    storage: StoragePersistence,
    silent_renew_running: AtomicBool,
}

impl FlowsDataService {
    pub fn new(storage: StoragePersistence) -> Self {
        Self { storage, silent_renew_running: AtomicBool::new(false) }
    }

    /// Generate, store and return a fresh nonce.
    pub fn create_nonce(&self) -> Result<String> {
        let nonce = generate_nonce();
        debug!("storing new nonce");
        self.set_nonce(&nonce)?;
        Ok(nonce)
    }

    pub fn set_nonce(&self, nonce: &str) -> Result<()> {
        self.storage.write(storage_keys::AUTH_NONCE, &nonce)
    }

    #[must_use]
    pub fn auth_nonce(&self) -> Option<String> {
        self.storage.read_string(storage_keys::AUTH_NONCE)
    }

    #[must_use]
    pub fn auth_state_control(&self) -> Option<String> {
        self.storage.read_string(storage_keys::AUTH_STATE_CONTROL)
    }

    pub fn set_auth_state_control(&self, state: &str) -> Result<()> {
        self.storage.write(storage_keys::AUTH_STATE_CONTROL, &state)
    }

    /// Generate and store a fresh `state` parameter.
    pub fn create_auth_state_control(&self) -> Result<String> {
        let state = generate_state();
        self.set_auth_state_control(&state)?;
        Ok(state)
    }

    pub fn get_existing_or_create_auth_state_control(&self) -> Result<String> {
        match self.auth_state_control() {
            Some(state) => Ok(state),
            None => self.create_auth_state_control(),
        }
    }

    /// Generate and store a PKCE verifier for the next code exchange.
    pub fn create_code_verifier(&self) -> Result<String> {
        let verifier = generate_code_verifier();
        self.storage.write(storage_keys::CODE_VERIFIER, &verifier)?;
        Ok(verifier)
    }

    #[must_use]
    pub fn code_verifier(&self) -> Option<String> {
        self.storage.read_string(storage_keys::CODE_VERIFIER)
    }

    pub fn set_session_state(&self, session_state: Option<&str>) -> Result<()> {
        match session_state {
            Some(value) => self.storage.write(storage_keys::SESSION_STATE, &value),
            None => self.storage.remove(storage_keys::SESSION_STATE),
        }
    }

    #[must_use]
    pub fn session_state(&self) -> Option<String> {
        self.storage.read_string(storage_keys::SESSION_STATE)
    }

    pub fn set_custom_request_params(&self, params: &CustomParams) -> Result<()> {
        self.storage.write(storage_keys::CUSTOM_REQUEST_PARAMS, params)
    }

    /// Custom params persisted by the last authorize call.
    #[must_use]
    pub fn custom_request_params(&self) -> CustomParams {
        self.storage.read(storage_keys::CUSTOM_REQUEST_PARAMS).unwrap_or_default()
    }

    /// Claim the renewal slot. Returns `false` if a renewal is already
    /// in flight.
    pub fn try_set_silent_renew_running(&self) -> bool {
        let acquired = self
            .silent_renew_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        debug!(acquired, "claiming silent renew slot");
        acquired
    }

    pub fn reset_silent_renew_running(&self) {
        self.silent_renew_running.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_silent_renew_running(&self) -> bool {
        self.silent_renew_running.load(Ordering::Acquire)
    }

    /// Drop every per-flow value and release the renewal flag.
    pub fn reset_storage_flow_data(&self) {
        self.storage.remove_logged(storage_keys::SESSION_STATE);
        self.storage.remove_logged(storage_keys::CODE_VERIFIER);
        self.storage.remove_logged(storage_keys::CUSTOM_REQUEST_PARAMS);
        self.reset_silent_renew_running();
    }
}
