//! Retrying HTTP client shared by the STS adapters.

use std::time::Duration;

use authlane_domain::{AuthError, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::{debug, warn};

use super::error::HttpError;
use crate::errors::InfraError;

/// HTTP client with retry and timeout support.
///
/// Only idempotent requests are retried. A token-endpoint POST carries a
/// single-use code or refresh token, so it is sent exactly once.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client with default settings.
    ///
    /// # Errors
    /// `AuthError::Transport` if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute `builder`, retrying connection failures and 5xx answers of
    /// idempotent requests with exponential backoff.
    ///
    /// # Errors
    /// `AuthError::Transport` once the request could not be completed.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            let request = builder
                .try_clone()
                .ok_or(HttpError::BodyNotCloneable)?
                .build()
                .map_err(|err| AuthError::from(InfraError::from(err)))?;

            let method = request.method().clone();
            let url = request.url().clone();
            let retryable = method.is_idempotent() && attempt + 1 < attempts;
            debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %url, %status, "received HTTP response");

                    if status.is_server_error() && retryable {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) => {
                    if retryable && should_retry_error(&err) {
                        debug!(
                            attempt = attempt + 1,
                            %method,
                            %url,
                            error = %err,
                            "HTTP request failed, retrying"
                        );
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    warn!(%method, %url, error = %err, "HTTP request failed");
                    return Err(InfraError::from(err).into());
                }
            }
        }

        Err(AuthError::Internal("http client exhausted retries without producing a result".into()))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = u32::try_from(retry_number.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1_u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: concat!("authlane/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// # Errors
    /// `AuthError::Transport` if the underlying client cannot be built.
    pub fn build(self) -> Result<HttpClient> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy()
            .build()
            .map_err(|err| AuthError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, max_attempts: self.max_attempts, base_backoff: self.base_backoff })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
