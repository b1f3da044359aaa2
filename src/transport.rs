//! HTTP transport seam
//!
//! Both clients talk to their backends exclusively through [`Transport`], so
//! tests can swap the reqwest implementation for an in-memory one.

use crate::config::HttpConfig;
use crate::errors::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Raw response body chunks, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response whose body is consumed incrementally
pub struct StreamingResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the remaining body into memory (used for error bodies)
    pub async fn collect_body(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Minimal HTTP primitive used by the clients
///
/// Errors returned here are always [`ClientError::Transport`]; status codes
/// are reported through the response, never as errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse>;

    /// Send a single file under `field` as multipart/form-data
    async fn post_multipart(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<HttpResponse>;

    async fn post_json_stream(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<StreamingResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create transport with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create transport honouring the HTTP section of the configuration
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::transport("Failed to initialize HTTP client", e))?;

        Ok(Self { client })
    }

    async fn buffer(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("Failed to read response", e))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::transport("Request failed", e))?;
        Self::buffer(response).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::transport("Request failed", e))?;
        Self::buffer(response).await
    }

    async fn post_multipart(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<HttpResponse> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/plain")
            .map_err(|e| ClientError::transport("Request failed", e))?;
        let form = Form::new().part(field.to_string(), part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::transport("Request failed", e))?;
        Self::buffer(response).await
    }

    async fn post_json_stream(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<StreamingResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::transport("Request failed", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|result| result.map_err(|e| ClientError::transport("Connection interrupted", e)))
            .boxed();

        Ok(StreamingResponse { status, body })
    }
}
