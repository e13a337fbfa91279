//! HTTP transport seam
//!
//! The fetcher only needs "send one GET, give me status + body". Keeping that
//! behind a trait lets tests script server behaviour without a network.

use super::types::{RawResponse, Request, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Issues a single GET request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

/// Configuration for the reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
    /// Optional API key, forwarded as `POLY_API_KEY` when present
    pub api_key: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("poly-harvest/", env!("CARGO_PKG_VERSION")).to_string(),
            api_key: None,
        }
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    config: HttpConfig,
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given configuration
    pub fn new(config: HttpConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .get(request.url())
            .query(&request.query)
            .header("Accept", "application/json");

        if let Some(ref key) = self.config.api_key {
            builder = builder.header("POLY_API_KEY", key);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("poly-harvest/"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(HttpConfig {
            timeout: Duration::from_secs(30),
            api_key: Some("key".to_string()),
            ..Default::default()
        });
        assert!(transport.is_ok());
    }
}
