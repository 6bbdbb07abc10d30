//! Client configuration structures
//!
//! Loaded by `authlane-infra::config` from environment variables or files;
//! every field has a default so partial documents are accepted.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_IAT_OFFSET_SECONDS, DEFAULT_SILENT_RENEW_TIMEOUT_SECONDS,
    DEFAULT_TOKEN_REFRESH_SECONDS, WELL_KNOWN_SUFFIX,
};
use crate::errors::{AuthError, Result};
use crate::impl_auth_enum_conversions;
use crate::types::CustomParams;

/// OpenID Connect client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIdConfiguration {
    /// Base address of the STS (issuer)
    pub sts_server: String,
    /// Discovery base; falls back to `sts_server` when unset
    pub auth_wellknown_endpoint: Option<String>,
    pub redirect_url: String,
    pub client_id: String,
    /// `code`, `id_token token` or `id_token`
    pub response_type: String,
    pub scope: String,
    pub post_logout_redirect_uri: Option<String>,
    /// Enables the periodic check and every renewal path
    pub silent_renew: bool,
    /// Redirect target of the hidden renew frame
    pub silent_renew_url: Option<String>,
    pub silent_renew_timeout_in_seconds: u64,
    /// Renew with the refresh-token grant instead of the iframe
    pub use_refresh_token: bool,
    /// Period of the periodic token check
    pub token_refresh_in_seconds: u64,
    /// Tokens are treated as expired this many seconds early
    pub silent_renew_offset_in_seconds: i64,
    pub auto_userinfo: bool,
    pub renew_userinfo_after_token_renew: bool,
    pub history_cleanup_off: bool,
    pub max_id_token_iat_offset_allowed_in_seconds: i64,
    pub disable_iat_offset_validation: bool,
    pub ignore_nonce_after_refresh: bool,
    /// Static extra parameters merged into every authorize request
    pub custom_params: CustomParams,
}

impl Default for OpenIdConfiguration {
    fn default() -> Self {
        Self {
            sts_server: String::new(),
            auth_wellknown_endpoint: None,
            redirect_url: String::new(),
            client_id: String::new(),
            response_type: "code".to_string(),
            scope: "openid email profile".to_string(),
            post_logout_redirect_uri: None,
            silent_renew: false,
            silent_renew_url: None,
            silent_renew_timeout_in_seconds: DEFAULT_SILENT_RENEW_TIMEOUT_SECONDS,
            use_refresh_token: false,
            token_refresh_in_seconds: DEFAULT_TOKEN_REFRESH_SECONDS,
            silent_renew_offset_in_seconds: 0,
            auto_userinfo: true,
            renew_userinfo_after_token_renew: true,
            history_cleanup_off: false,
            max_id_token_iat_offset_allowed_in_seconds: DEFAULT_MAX_IAT_OFFSET_SECONDS,
            disable_iat_offset_validation: false,
            ignore_nonce_after_refresh: false,
            custom_params: CustomParams::new(),
        }
    }
}

impl OpenIdConfiguration {
    /// Which flow the configuration selects.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self.response_type.trim() {
            "code" if self.use_refresh_token => FlowType::CodeFlowWithRefreshTokens,
            "code" => FlowType::CodeFlow,
            _ => FlowType::ImplicitFlow,
        }
    }

    /// Discovery base address, if any is configured.
    #[must_use]
    pub fn well_known_base(&self) -> Option<&str> {
        self.auth_wellknown_endpoint
            .as_deref()
            .or(Some(self.sts_server.as_str()))
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Full discovery document URL.
    #[must_use]
    pub fn well_known_url(&self) -> Option<String> {
        self.well_known_base().map(|base| {
            if base.ends_with(WELL_KNOWN_SUFFIX) {
                base.to_string()
            } else {
                format!("{}{WELL_KNOWN_SUFFIX}", base.trim_end_matches('/'))
            }
        })
    }

    /// Whether the implicit response type requests an access token.
    #[must_use]
    pub fn response_type_includes_access_token(&self) -> bool {
        self.response_type.split_whitespace().any(|part| part == "token" || part == "code")
    }

    /// Reject configurations the client cannot operate with.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if `client_id` or `sts_server` is empty,
    /// or if the response type is unsupported.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config("client_id is required".into()));
        }
        if self.sts_server.trim().is_empty() {
            return Err(AuthError::Config("sts_server is required".into()));
        }
        match self.response_type.trim() {
            "code" | "id_token token" | "id_token" => Ok(()),
            other => Err(AuthError::Config(format!("unsupported response_type: {other}"))),
        }
    }
}

/// Flow selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    CodeFlowWithRefreshTokens,
    CodeFlow,
    ImplicitFlow,
}

impl_auth_enum_conversions!(FlowType {
    CodeFlowWithRefreshTokens => "code_flow_with_refresh_tokens",
    CodeFlow => "code_flow",
    ImplicitFlow => "implicit_flow",
});

impl FlowType {
    #[must_use]
    pub const fn is_code_flow(self) -> bool {
        matches!(self, Self::CodeFlow | Self::CodeFlowWithRefreshTokens)
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub oidc: OpenIdConfiguration,
    pub logging: LoggingConfig,
}
