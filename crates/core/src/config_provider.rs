//! Runtime access to the client configuration

use authlane_domain::{FlowType, OpenIdConfiguration};
use parking_lot::RwLock;

/// Shared, runtime-updatable configuration.
///
/// Services read a snapshot per operation, so a toggle such as disabling
/// silent renew takes effect on the next tick.
#[derive(Debug, Default)]
pub struct ConfigurationProvider {
    inner: RwLock<OpenIdConfiguration>,
}

impl ConfigurationProvider {
    #[must_use]
    pub fn new(config: OpenIdConfiguration) -> Self {
        Self { inner: RwLock::new(config) }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn get(&self) -> OpenIdConfiguration {
        self.inner.read().clone()
    }

    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.inner.read().flow_type()
    }

    /// Apply `change` under the write lock.
    pub fn update(&self, change: impl FnOnce(&mut OpenIdConfiguration)) {
        change(&mut self.inner.write());
    }

    pub fn set_silent_renew(&self, enabled: bool) {
        self.update(|config| config.silent_renew = enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_are_visible_to_later_snapshots() {
        let provider = ConfigurationProvider::new(OpenIdConfiguration {
            silent_renew: true,
            ..OpenIdConfiguration::default()
        });
        let before = provider.get();

        provider.set_silent_renew(false);

        assert!(before.silent_renew);
        assert!(!provider.get().silent_renew);
    }
}
