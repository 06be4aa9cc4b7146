use std::time::Duration;

use evesso_domain::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use evesso_domain::{EvessoError, Result};
use reqwest::{Client as ReqwestClient, IntoUrl, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::http_error;

/// Default `User-Agent` sent to the identity provider.
pub const DEFAULT_USER_AGENT: &str = concat!("evesso/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by discovery, the key manager and the token endpoint.
///
/// Requests are sent once. Retrying is left to callers.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Borrow the underlying reqwest client.
    pub const fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    /// GET `url` and decode a successful JSON body.
    ///
    /// # Errors
    /// `Timeout` or `Transient` for transport failures, non-2xx statuses and
    /// undecodable bodies.
    pub async fn get_json<T, U>(&self, url: U) -> Result<T>
    where
        T: DeserializeOwned,
        U: IntoUrl,
    {
        let url = url.into_url().map_err(http_error)?;
        debug!(%url, "sending HTTP request");

        let response = self.client.get(url.clone()).send().await.map_err(http_error)?;
        let status = response.status();
        debug!(%url, %status, "received HTTP response");

        if !status.is_success() {
            return Err(EvessoError::Transient(format!("GET {url} returned HTTP {status}")));
        }
        response.json::<T>().await.map_err(http_error)
    }

    /// POST an `application/x-www-form-urlencoded` body.
    ///
    /// The response is returned whatever its status.
    ///
    /// # Errors
    /// `Timeout` or `Transient` for transport failures.
    pub async fn post_form<U: IntoUrl>(&self, url: U, form: &[(&str, &str)]) -> Result<Response> {
        let url = url.into_url().map_err(http_error)?;
        debug!(%url, "sending HTTP request");

        let response = self.client.post(url.clone()).form(form).send().await.map_err(http_error)?;
        debug!(%url, status = %response.status(), "received HTTP response");
        Ok(response)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
            .no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| match http_error(err) {
            EvessoError::Transient(msg) | EvessoError::Timeout(msg) => EvessoError::Config(msg),
            other => other,
        })?;

        Ok(HttpClient { client })
    }
}
