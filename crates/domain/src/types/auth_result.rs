//! Raw authorization and token endpoint responses

use serde::{Deserialize, Serialize};

/// Tokens and protocol fields returned by the STS.
///
/// Populated either from a token endpoint JSON body (code and refresh flows)
/// or from the URL fragment of an implicit-flow redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthResult {
    /// Build from decoded query or fragment parameters.
    ///
    /// Unknown keys are ignored; a non-numeric `expires_in` is dropped.
    pub fn from_params<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut result = Self::default();
        for (key, value) in params {
            let value = Some(value.to_string());
            match key {
                "id_token" => result.id_token = value,
                "access_token" => result.access_token = value,
                "refresh_token" => result.refresh_token = value,
                "token_type" => result.token_type = value,
                "expires_in" => result.expires_in = value.and_then(|v| v.parse().ok()),
                "scope" => result.scope = value,
                "state" => result.state = value,
                "session_state" => result.session_state = value,
                "error" => result.error = value,
                "error_description" => result.error_description = value,
                _ => {}
            }
        }
        result
    }

    /// Whether the STS returned an error code.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}
