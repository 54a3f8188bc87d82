//! Outbound transport capability.
//!
//! Remote dispatch goes through the [`Transport`] trait so the HTTP client is
//! replaceable (and observable in tests). [`HttpTransport`] is the default
//! implementation on a blocking `reqwest` client; the blocking call runs on
//! the coroutine's carrier thread like every other outbound call in this
//! runtime.

use std::time::Duration;

use http::Method;
use thiserror::Error;

/// Transport-level failure for a remote call. Wrapped into
/// [`crate::error::DispatchError::RemoteCallFailed`] by the dispatcher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Raw response produced by a transport send.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Whether the declared content type is JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false)
    }
}

/// Opaque send capability: `send(method, url, headers, body) -> response`.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Blocking HTTP transport with JSON defaults.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(timeout)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "application/json")
            .body(body.to_vec());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}
