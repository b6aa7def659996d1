//! HTTP transport used by the camera probe and the snapshot cache.
//!
//! The core only sees the [`HttpTransport`] trait; [`ReqwestTransport`] is the
//! production implementation. Pi certificates are self-signed, so TLS
//! verification is disabled on this client.

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("timeout fetching {0}")]
    Timeout(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("invalid JSON from {0}")]
    InvalidJson(String),
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// Image (ou autre payload binaire) récupérée depuis un device
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub data: Vec<u8>,
    pub content_type: String,
}

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value, TransportError>;

    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<FetchedBytes, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("picam-kernel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_err(url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status { url: url.to_string(), status: response.status().as_u16() });
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value, TransportError> {
        let body = self.get(url, timeout).await?.bytes().await.map_err(|e| map_err(url, e))?;
        serde_json::from_slice(&body).map_err(|_| TransportError::InvalidJson(url.to_string()))
    }

    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<FetchedBytes, TransportError> {
        let response = self.get(url, timeout).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = response.bytes().await.map_err(|e| map_err(url, e))?;
        Ok(FetchedBytes { data: data.to_vec(), content_type })
    }
}

fn map_err(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(url.to_string())
    } else {
        TransportError::Request { url: url.to_string(), message: e.without_url().to_string() }
    }
}
