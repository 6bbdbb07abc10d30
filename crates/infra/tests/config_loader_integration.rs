//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use authlane_domain::{AuthError, FlowType};
use authlane_infra::config;
use tempfile::TempDir;

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("authlane.json");
    std::fs::write(
        &path,
        r#"{
            "oidc": {
                "sts_server": "https://sts.example.com",
                "client_id": "spa",
                "redirect_url": "https://app.example.com/callback",
                "use_refresh_token": true,
                "silent_renew": true,
                "custom_params": { "ui_locales": "de", "max_age": 3600 }
            },
            "logging": { "level": "authlane_core=debug", "json": true }
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Failed to load config from JSON file");

    assert_eq!(config.oidc.flow_type(), FlowType::CodeFlowWithRefreshTokens);
    assert_eq!(config.oidc.custom_params.len(), 2);
    assert_eq!(config.oidc.token_refresh_in_seconds, 4);
    assert!(config.logging.json);
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[oidc]
sts_server = "https://sts.example.com"
auth_wellknown_endpoint = "https://login.example.com"
client_id = "spa"
response_type = "id_token"
"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Failed to load config from TOML file");

    assert_eq!(config.oidc.flow_type(), FlowType::ImplicitFlow);
    assert_eq!(
        config.oidc.well_known_url().as_deref(),
        Some("https://login.example.com/.well-known/openid-configuration")
    );
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_unsupported_response_type_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("authlane.json");
    std::fs::write(
        &path,
        r#"{
            "oidc": {
                "sts_server": "https://sts.example.com",
                "client_id": "spa",
                "response_type": "token"
            }
        }"#,
    )
    .expect("Failed to write config");

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert_eq!(err, AuthError::Config("unsupported response_type: token".into()));
}
