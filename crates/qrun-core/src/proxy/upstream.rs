//! Upstream fetch collaborator.
//!
//! The proxy only needs a status code, a content type and a byte stream
//! from the origin. `HttpUpstream` provides them with reqwest; tests provide
//! their own implementation.

use crate::error::{ProxyError, Result};
use crate::proxy::origin::Origin;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Streamed body of an upstream response.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response returned by an [`Upstream`] fetch.
pub struct UpstreamResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, when the origin sent one
    pub content_type: Option<String>,
    /// Response body
    pub body: ByteStream,
}

impl UpstreamResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Fetches origin-relative resource paths from the upstream origin.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Starts fetching `resource_path` (query string included).
    ///
    /// Resolves once the status and headers are known; the body streams
    /// afterwards.
    async fn fetch(&self, resource_path: &str) -> Result<UpstreamResponse>;
}

/// reqwest-backed upstream.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    origin: Origin,
}

impl HttpUpstream {
    /// Creates an upstream for `origin` with a default client.
    ///
    /// # Errors
    ///
    /// Returns `Http` if the client cannot be built.
    pub fn new(origin: Origin) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("qrun/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, origin))
    }

    /// Creates an upstream reusing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, origin: Origin) -> Self {
        Self { client, origin }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, resource_path: &str) -> Result<UpstreamResponse> {
        let url = self.origin.resource_url(resource_path);
        debug!(url = %url, "Fetching upstream resource");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamFetch {
                path: resource_path.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProxyError::from))
            .boxed();

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
