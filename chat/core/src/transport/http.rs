//! HTTP Transport
//!
//! Talks to the retrieval-augmented chat backend:
//!
//! - `POST {endpoint}` with `{ query, history }`, answered by a chunked
//!   `application/x-ndjson` body
//! - `GET {base}{health_path}`, answered by `{ "status": ..., "rag_ready": bool }`
//!
//! Only a connect timeout is set. A streamed answer may legitimately take
//! minutes, and ending it early is the user's call, not the transport's.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{ByteStream, ChatRequest, ChatTransport};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// Timeout for the health probe
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the chat backend
#[derive(Clone, Debug)]
pub struct HttpTransport {
    /// Chat endpoint URL
    endpoint: String,
    /// Health endpoint URL
    health_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for `endpoint`, probing health at `health_path`
    /// on the same host.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed (e.g. no TLS backend).
    pub fn new(
        endpoint: impl Into<String>,
        health_path: &str,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into();
        let health_url = health_url(&endpoint, health_path);
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint,
            health_url,
            http_client,
        })
    }

    /// Create from the resolved client configuration
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(
            config.endpoint.clone(),
            &config.health_path,
            config.connect_timeout,
        )
    }

    /// Chat endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Health endpoint URL
    #[must_use]
    pub fn health_url(&self) -> &str {
        &self.health_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn health_check(&self) -> bool {
        let response = match self
            .http_client
            .get(&self.health_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Health check failed");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health check unreachable");
                return false;
            }
        };

        // A backend that is up but still loading its index reports rag_ready=false
        match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("rag_ready")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true),
            Err(_) => true,
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            history = request.history.len(),
            "Opening chat stream"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));

        Ok(Box::pin(body))
    }
}

/// Derive the health URL from the chat endpoint: same scheme and authority,
/// `health_path` as the path
fn health_url(endpoint: &str, health_path: &str) -> String {
    let authority_start = endpoint.find("://").map_or(0, |i| i + 3);
    let base = match endpoint[authority_start..].find('/') {
        Some(path_start) => &endpoint[..authority_start + path_start],
        None => endpoint,
    };
    format!("{}/{}", base, health_path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_derivation() {
        assert_eq!(
            health_url("http://localhost:8000/api/chat", "/health"),
            "http://localhost:8000/health"
        );
        assert_eq!(
            health_url("https://chat.example.com", "health"),
            "https://chat.example.com/health"
        );
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::default();
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://localhost:8000/api/chat");
        assert_eq!(transport.health_url(), "http://localhost:8000/health");
        assert_eq!(transport.name(), "HTTP");
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Port 9 (discard) is essentially never served locally
        let transport =
            HttpTransport::new("http://127.0.0.1:9/api/chat", "/health", Duration::from_millis(200))
                .unwrap();

        assert!(!transport.health_check().await);
        let err = transport
            .open_stream(&ChatRequest::new("hello"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
