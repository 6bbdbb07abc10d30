//! reqwest-backed [`OidcTransport`].

use async_trait::async_trait;
use authlane_core::OidcTransport;
use authlane_domain::{AuthError, Result};
use reqwest::header::ACCEPT;
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::instrument;

use super::client::HttpClient;
use super::error::HttpError;

/// Talks to the STS discovery, JWKS, user-info and token endpoints.
#[derive(Clone)]
pub struct HttpOidcTransport {
    client: HttpClient,
}

impl HttpOidcTransport {
    pub const fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Transport over a default [`HttpClient`].
    ///
    /// # Errors
    /// When the HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self> {
        HttpClient::new().map(Self::new)
    }
}

#[async_trait]
impl OidcTransport for HttpOidcTransport {
    #[instrument(skip(self, bearer), fields(authenticated = bearer.is_some()))]
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value> {
        let mut request =
            self.client.request(Method::GET, parse_url(url)?).header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        read_json(url, self.client.send(request).await?).await
    }

    #[instrument(skip(self, form))]
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Value> {
        let request = self
            .client
            .request(Method::POST, parse_url(url)?)
            .header(ACCEPT, "application/json")
            .form(form);
        read_json(url, self.client.send(request).await?).await
    }
}

fn parse_url(url: &str) -> Result<url::Url> {
    url::Url::parse(url).map_err(|err| {
        HttpError::InvalidUrl { url: url.to_string(), reason: err.to_string() }.into()
    })
}

async fn read_json(url: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.map_err(|err| AuthError::Transport(err.to_string()))?;

    if !status.is_success() {
        return Err(HttpError::from_status(status.as_u16(), &body).into());
    }

    serde_json::from_str(&body).map_err(|err| {
        HttpError::InvalidJson { url: url.to_string(), reason: err.to_string() }.into()
    })
}
