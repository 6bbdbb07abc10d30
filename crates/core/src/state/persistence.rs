use std::sync::Arc;

use authlane_domain::constants::storage_keys;
use authlane_domain::{AuthResult, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::ports::AuthStorage;

/// Typed wrapper around the [`AuthStorage`] port.
///
/// Reads degrade to `None` when a slot is missing, unreadable or holds a
/// value of another shape; the failure is logged.
#[derive(Clone)]
pub struct StoragePersistence {
    storage: Arc<dyn AuthStorage>,
}

impl StoragePersistence {
    pub fn new(storage: Arc<dyn AuthStorage>) -> Self {
        Self { storage }
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.storage.read(key) {
            Ok(Some(Value::Null) | None) => return None,
            Ok(Some(value)) => value,
            Err(err) => {
                warn!(key, error = %err, "failed to read storage slot");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, error = %err, "storage slot holds unexpected data");
                None
            }
        }
    }

    /// Read a string slot, treating the empty string as absent.
    pub fn read_string(&self, key: &str) -> Option<String> {
        self.read::<String>(key).filter(|value| !value.is_empty())
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|err| authlane_domain::AuthError::Storage(err.to_string()))?;
        self.storage.write(key, value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key)
    }

    /// Remove `key`, logging instead of failing. Used on reset paths.
    pub fn remove_logged(&self, key: &str) {
        if let Err(err) = self.storage.remove(key) {
            warn!(key, error = %err, "failed to clear storage slot");
        }
    }

    pub fn auth_result(&self) -> Option<AuthResult> {
        self.read(storage_keys::AUTHN_RESULT)
    }

    /// Id token of the last stored authorization result.
    pub fn id_token(&self) -> Option<String> {
        self.auth_result().and_then(|result| result.id_token).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.auth_result().and_then(|result| result.refresh_token).filter(|t| !t.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_string(storage_keys::AUTHZ_DATA)
    }
}
