//! Network substrate
//!
//! [`Fetcher`] performs a request against the network. [`HttpFetcher`] is
//! the reqwest implementation; it resolves relative paths against a base URL
//! so manifests can list paths like `/index.html`.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use thiserror::Error;

use crate::http::{resolve_url, Method, Request, Response};

/// Network error types
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be completed
    #[error("Network error: {0}")]
    Network(String),

    /// URL could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be built
    #[error("Client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Performs requests against the network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send `request` and capture the whole response
    ///
    /// Non-2xx statuses are responses, not errors; only failures to obtain
    /// a response are reported as [`FetchError`].
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// HTTP fetcher configuration
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Origin that relative request paths are resolved against
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent header
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("text-pwa/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpFetcherConfig {
    /// Create a configuration for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ReqwestClient,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    /// Create a new fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Absolute URL for a request URL or path
    pub fn resolve(&self, url: &str) -> String {
        resolve_url(&self.config.base_url, url)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = self.resolve(&request.url);

        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Head => self.client.head(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
            Method::Options => self.client.request(reqwest::Method::OPTIONS, &url),
        };

        for (name, value) in &request.headers {
            req = req.header(name, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let response = req.send().await?;
        let status = response.status().as_u16();

        let mut headers = Vec::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.push((name.to_string(), value_str.to_string()));
            }
        }

        let body = response.bytes().await?.to_vec();
        tracing::debug!(method = %request.method, url = %url, status, "fetched");

        Ok(Response { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_paths() {
        let fetcher = HttpFetcher::new(HttpFetcherConfig::new("http://localhost:9000/")).unwrap();

        assert_eq!(fetcher.resolve("/index.html"), "http://localhost:9000/index.html");
        assert_eq!(fetcher.resolve("css/app.css"), "http://localhost:9000/css/app.css");
        assert_eq!(
            fetcher.resolve("https://cdn.example.com/lib.js"),
            "https://cdn.example.com/lib.js"
        );
    }

    #[test]
    fn test_config_builder() {
        let config = HttpFetcherConfig::new("https://text.example")
            .timeout(Duration::from_secs(5))
            .user_agent("tests");

        assert_eq!(config.base_url, "https://text.example");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "tests");
    }
}
