//! HTTP adapter error types

use authlane_domain::AuthError;
use thiserror::Error;

use crate::errors::InfraError;

/// Failures of an STS call that reached the server.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The endpoint answered with a non-success status
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The response body was not the expected JSON document
    #[error("invalid JSON response from {url}: {reason}")]
    InvalidJson { url: String, reason: String },

    /// The URL could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A request body could not be replayed for a retry
    #[error("request body cannot be cloned; buffer the body to enable retries")]
    BodyNotCloneable,
}

impl HttpError {
    /// Build a status error, preferring the OAuth `error` fields of the body.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                let error = value.get("error")?.as_str()?.to_string();
                Some(match value.get("error_description").and_then(|d| d.as_str()) {
                    Some(description) => format!("{error} ({description})"),
                    None => error,
                })
            })
            .unwrap_or_else(|| body.chars().take(200).collect());
        Self::Status { status, detail }
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let auth = match err {
            HttpError::BodyNotCloneable => AuthError::Internal(err.to_string()),
            _ => AuthError::Transport(err.to_string()),
        };
        Self(auth)
    }
}

impl From<HttpError> for AuthError {
    fn from(err: HttpError) -> Self {
        InfraError::from(err).into()
    }
}
