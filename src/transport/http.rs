//! HTTP transport: the last stage of every pipeline.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::{ApiConfig, CONNECT_TIMEOUT, REQUEST_TIMEOUT, USER_AGENT};
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, ApiResponse};

/// Sends [`ApiRequest`]s to the backend and buffers the response.
///
/// No authentication and no retries happen here.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport with default timeouts.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeouts(base_url, USER_AGENT, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Create a transport from the `[api]` configuration section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::with_timeouts(
            &config.base_url,
            &config.user_agent,
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    pub fn with_timeouts(
        base_url: &str,
        user_agent: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Self::with_client(client, base_url)
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send one request without any middleware.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(request.path())?;
        debug!(id = %request.id(), method = %request.method(), %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_transport_error)?;

        Ok(ApiResponse::new(status, headers, body))
    }
}

/// Ensure the base URL ends with `/` so relative joins append instead of
/// replacing the last path segment.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("Not a usable base URL: {}", base_url)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn map_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e)
    }
}
