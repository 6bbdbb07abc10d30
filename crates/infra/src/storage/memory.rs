//! Process-local storage.

use std::collections::HashMap;

use authlane_core::AuthStorage;
use authlane_domain::Result;
use parking_lot::RwLock;
use serde_json::Value;

/// Keeps slots in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl AuthStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        self.slots.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn write_replaces_and_remove_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.write("authNonce", json!("n-1")).unwrap();
        storage.write("authNonce", json!("n-2")).unwrap();
        assert_eq!(storage.read("authNonce").unwrap(), Some(json!("n-2")));

        storage.remove("authNonce").unwrap();
        storage.remove("authNonce").unwrap();
        assert!(storage.read("authNonce").unwrap().is_none());
        assert!(storage.is_empty());
    }
}
