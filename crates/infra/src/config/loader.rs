//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when the required ones are present
//! 2. Otherwise the first config file found by [`find_config_file`]
//!
//! JSON and TOML files are supported, selected by extension. The loaded
//! client settings are validated before they are returned.
//!
//! ## Environment Variables
//! Required:
//! - `AUTHLANE_STS_SERVER`: issuer base address
//! - `AUTHLANE_CLIENT_ID`: client identifier registered at the STS
//! - `AUTHLANE_REDIRECT_URL`: login redirect target
//!
//! Optional:
//! - `AUTHLANE_AUTH_WELLKNOWN_ENDPOINT`: discovery base when it differs from the issuer
//! - `AUTHLANE_RESPONSE_TYPE`: `code`, `id_token token` or `id_token`
//! - `AUTHLANE_SCOPE`
//! - `AUTHLANE_POST_LOGOUT_REDIRECT_URI`
//! - `AUTHLANE_SILENT_RENEW`: enable renewal (true/false)
//! - `AUTHLANE_SILENT_RENEW_URL`: redirect target of the renew frame
//! - `AUTHLANE_SILENT_RENEW_TIMEOUT_SECONDS`
//! - `AUTHLANE_USE_REFRESH_TOKEN`: renew with the refresh-token grant (true/false)
//! - `AUTHLANE_TOKEN_REFRESH_SECONDS`: period of the token check
//! - `AUTHLANE_AUTO_USERINFO`: fetch user info after login (true/false)
//! - `AUTHLANE_LOG_LEVEL`: default log filter
//! - `AUTHLANE_LOG_JSON`: JSON log lines (true/false)
//!
//! ## File Locations
//! `authlane.{json,toml}` then `config.{json,toml}`, looked up in the
//! working directory, its two parents, then the same three levels around
//! the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use authlane_domain::{AppConfig, LoggingConfig, OpenIdConfiguration, Result};
use tracing::{debug, info};

use super::error::ConfigError;

const FILE_NAMES: [&str; 4] = ["authlane.json", "authlane.toml", "config.json", "config.toml"];

/// Load configuration from the environment, falling back to a file.
///
/// # Errors
/// `AuthError::Config` when neither source yields a valid configuration.
pub fn load() -> Result<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(err) => {
            debug!(error = %err, "environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `AUTHLANE_*` environment variables.
///
/// # Errors
/// `AuthError::Config` if a required variable is missing or any value is
/// malformed.
pub fn load_from_env() -> Result<AppConfig> {
    let defaults = OpenIdConfiguration::default();

    let oidc = OpenIdConfiguration {
        sts_server: env_var("AUTHLANE_STS_SERVER")?,
        client_id: env_var("AUTHLANE_CLIENT_ID")?,
        redirect_url: env_var("AUTHLANE_REDIRECT_URL")?,
        auth_wellknown_endpoint: env_opt("AUTHLANE_AUTH_WELLKNOWN_ENDPOINT"),
        response_type: env_opt("AUTHLANE_RESPONSE_TYPE").unwrap_or(defaults.response_type),
        scope: env_opt("AUTHLANE_SCOPE").unwrap_or(defaults.scope),
        post_logout_redirect_uri: env_opt("AUTHLANE_POST_LOGOUT_REDIRECT_URI"),
        silent_renew: env_bool("AUTHLANE_SILENT_RENEW", defaults.silent_renew),
        silent_renew_url: env_opt("AUTHLANE_SILENT_RENEW_URL"),
        silent_renew_timeout_in_seconds: env_parse(
            "AUTHLANE_SILENT_RENEW_TIMEOUT_SECONDS",
            defaults.silent_renew_timeout_in_seconds,
        )?,
        use_refresh_token: env_bool("AUTHLANE_USE_REFRESH_TOKEN", defaults.use_refresh_token),
        token_refresh_in_seconds: env_parse(
            "AUTHLANE_TOKEN_REFRESH_SECONDS",
            defaults.token_refresh_in_seconds,
        )?,
        auto_userinfo: env_bool("AUTHLANE_AUTO_USERINFO", defaults.auto_userinfo),
        ..defaults
    };
    oidc.validate()?;

    let logging_defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: env_opt("AUTHLANE_LOG_LEVEL").unwrap_or(logging_defaults.level),
        json: env_bool("AUTHLANE_LOG_JSON", logging_defaults.json),
    };

    Ok(AppConfig { oidc, logging })
}

/// Load configuration from a file.
///
/// `None` searches the standard locations with [`find_config_file`].
///
/// # Errors
/// `AuthError::Config` if the file is missing, unreadable, malformed or
/// describes an unusable client.
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) if path.exists() => path,
        Some(path) => return Err(ConfigError::NotFound(path).into()),
        None => find_config_file().ok_or(ConfigError::NoConfigFile)?,
    };

    info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    let config = parse_config(&contents, &config_path)?;
    config.oidc.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> std::result::Result<AppConfig, ConfigError> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|err| ConfigError::Parse { format: "TOML", reason: err.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|err| ConfigError::Parse { format: "JSON", reason: err.to_string() }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// First existing config file in the standard locations, if any.
pub fn find_config_file() -> Option<PathBuf> {
    let mut bases = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        bases.push(exe_dir);
    }

    bases
        .iter()
        .flat_map(|base| base.ancestors().take(3))
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> std::result::Result<String, ConfigError> {
    env_opt(key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key).map_or(Ok(default), |raw| {
        raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: err.to_string(),
        })
    })
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key).map_or(default, |value| {
        matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use authlane_domain::AuthError;
    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 6] = [
        "AUTHLANE_STS_SERVER",
        "AUTHLANE_CLIENT_ID",
        "AUTHLANE_REDIRECT_URL",
        "AUTHLANE_SILENT_RENEW",
        "AUTHLANE_TOKEN_REFRESH_SECONDS",
        "AUTHLANE_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().unwrap();

        let cases = [("1", true), ("TRUE", true), ("on", true), ("no", false), ("off", false)];
        for (value, expected) in cases {
            std::env::set_var("AUTHLANE_TEST_BOOL", value);
            assert_eq!(env_bool("AUTHLANE_TEST_BOOL", !expected), expected, "value {value}");
        }

        std::env::remove_var("AUTHLANE_TEST_BOOL");
        assert!(env_bool("AUTHLANE_TEST_BOOL", true));
        assert!(!env_bool("AUTHLANE_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("AUTHLANE_STS_SERVER", "https://sts.example.com");
        std::env::set_var("AUTHLANE_CLIENT_ID", "spa");
        std::env::set_var("AUTHLANE_REDIRECT_URL", "https://app.example.com/callback");
        std::env::set_var("AUTHLANE_SILENT_RENEW", "true");
        std::env::set_var("AUTHLANE_TOKEN_REFRESH_SECONDS", "10");
        std::env::set_var("AUTHLANE_LOG_JSON", "yes");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.oidc.client_id, "spa");
        assert!(config.oidc.silent_renew);
        assert_eq!(config.oidc.token_refresh_in_seconds, 10);
        assert_eq!(config.oidc.response_type, "code");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let err = load_from_env().unwrap_err();
        assert_eq!(
            err,
            AuthError::Config("Missing required environment variable: AUTHLANE_STS_SERVER".into())
        );
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("AUTHLANE_STS_SERVER", "https://sts.example.com");
        std::env::set_var("AUTHLANE_CLIENT_ID", "spa");
        std::env::set_var("AUTHLANE_REDIRECT_URL", "https://app.example.com/callback");
        std::env::set_var("AUTHLANE_TOKEN_REFRESH_SECONDS", "soon");

        let result = load_from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(AuthError::Config(msg)) if msg.contains("AUTHLANE_TOKEN_REFRESH_SECONDS")
        ));
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("authlane.toml");
        std::fs::write(
            &path,
            r#"
[oidc]
sts_server = "https://sts.example.com"
client_id = "spa"
response_type = "id_token token"
silent_renew = true

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.oidc.response_type, "id_token token");
        assert!(config.oidc.silent_renew);
        assert_eq!(config.oidc.silent_renew_timeout_in_seconds, 20);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file_rejects_unusable_client() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "oidc": { "sts_server": "https://sts.example.com" } }"#)
            .unwrap();

        let err = load_from_file(Some(path)).unwrap_err();
        assert_eq!(err, AuthError::Config("client_id is required".into()));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/authlane.json"))).unwrap_err();
        assert!(matches!(err, AuthError::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let err = parse_config(r#"{ "oidc": "#, Path::new("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let err = parse_config("oidc: {}", Path::new("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }
}
