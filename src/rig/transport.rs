//! HTTP transport to the rig
//!
//! The [`RigTransport`] trait is the seam between the controller and the wire:
//! [`HttpTransport`] talks to a real rig with `reqwest`, and
//! [`MockTransport`](crate::rig::mock::MockTransport) simulates one in-process.
//! Transports hold no rig state and never retry; retry policy belongs to the
//! controller's poll loop.

use crate::error::{AppResult, TentaluxError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Request/response access to the rig API.
#[async_trait]
pub trait RigTransport: Send + Sync {
    /// POST `form` (URL-encoded) to `path` and decode the JSON answer.
    async fn post(&self, path: &str, form: &[(&str, &str)]) -> AppResult<Value>;

    /// GET `path` and decode the JSON answer.
    async fn get(&self, path: &str) -> AppResult<Value>;

    /// GET `path` and return the raw body. Only the connect phase is bounded
    /// by the request timeout; callers bound the transfer themselves.
    async fn get_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// `scheme://host:port` of the rig.
    fn base_url(&self) -> &str;

    /// Absolute URL of `path`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// `reqwest`-backed transport for a real rig.
///
/// JSON calls are bounded by the request timeout per request; raw fetches are
/// not, so a slow camera is limited by its own bound instead.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the rig at `base_url` (as produced by
    /// [`TentaluxConfig::base_url`](crate::config::TentaluxConfig::base_url)).
    ///
    /// # Errors
    /// `Network` if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| TentaluxError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!(base_url = %base_url, "HTTP transport ready");

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    async fn read_body(response: reqwest::Response) -> AppResult<Bytes> {
        let response = response.error_for_status()?;
        Ok(response.bytes().await?)
    }

    fn decode(path: &str, body: &[u8]) -> AppResult<Value> {
        serde_json::from_slice(body).map_err(|e| {
            TentaluxError::Protocol(format!("{} returned invalid JSON: {}", path, e))
        })
    }
}

#[async_trait]
impl RigTransport for HttpTransport {
    async fn post(&self, path: &str, form: &[(&str, &str)]) -> AppResult<Value> {
        tracing::trace!(path, "POST");
        let mut request = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout);
        if !form.is_empty() {
            request = request.form(form);
        }
        let body = Self::read_body(request.send().await?).await?;
        Self::decode(path, &body)
    }

    async fn get(&self, path: &str) -> AppResult<Value> {
        tracing::trace!(path, "GET");
        let request = self.client.get(self.url(path)).timeout(self.request_timeout);
        let body = Self::read_body(request.send().await?).await?;
        Self::decode(path, &body)
    }

    async fn get_bytes(&self, path: &str) -> AppResult<Bytes> {
        tracing::trace!(path, "GET (raw)");
        Self::read_body(self.client.get(self.url(path)).send().await?).await
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new("http://rig.local:8080/", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(transport.base_url(), "http://rig.local:8080");
        assert_eq!(transport.url("/status"), "http://rig.local:8080/status");
    }

    #[tokio::test]
    async fn test_unreachable_rig_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(format!("http://{}", addr), Duration::from_millis(500)).unwrap();
        let err = transport.post("/status", &[]).await.unwrap_err();
        assert!(matches!(err, TentaluxError::Network(_)), "got {:?}", err);
    }
}
