//! HTTP transport
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - Sending the adult-content consent cookie the board requires
//! - Classifying failures into timeouts, HTTP statuses and network errors

use crate::config::SourceConfig;
use crate::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Cookie the board checks before serving age-restricted boards
const ADULT_CONSENT_COOKIE: &str = "over18=1";

/// Something that can fetch a page's raw bytes
///
/// The crawler only ever talks to the network through this trait, so tests
/// can substitute scripted pages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url`, giving up after `timeout`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Bytes, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The source configuration (user agent, consent cookie)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &SourceConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if config.adult_consent {
        headers.insert(COOKIE, HeaderValue::from_static(ADULT_CONSENT_COOKIE));
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Bytes, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} returned HTTP {}", url, status.as_u16());
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| classify_error(e, timeout))
    }
}

fn classify_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if let Some(status) = error.status() {
        TransportError::Status(status.as_u16())
    } else {
        TransportError::Network(error.to_string())
    }
}
