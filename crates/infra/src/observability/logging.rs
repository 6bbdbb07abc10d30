//! `tracing-subscriber` setup.
//!
//! `RUST_LOG` wins over the configured level so a host can raise verbosity
//! without touching its config file.

use authlane_domain::{LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigError;

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, which is
/// expected when the host sets up its own logging first.
///
/// # Errors
/// `AuthError::Config` if `config.level` is not a valid filter directive.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    Ok(installed.is_ok())
}

fn filter_for(level: &str) -> std::result::Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level).map_err(|err| ConfigError::InvalidValue {
        key: "logging.level".into(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialisation_is_not_an_error() {
        let config = LoggingConfig { level: "authlane_core=debug,warn".into(), json: true };
        init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn per_crate_directives_are_kept() {
        let filter = filter_for("authlane_core=debug,warn").unwrap();
        assert!(filter.to_string().contains("authlane_core=debug"));
    }
}
