//! Retrieval backend client
//!
//! Talks to the document index service:
//! - `GET  /get_existing_documents/` (best effort, never fails)
//! - `POST /upload/` multipart, field `file`
//! - `POST /query/`  `{ text, max_responses }`
//! - `GET  /topics/`

use crate::config::{Config, RetrievalConfig};
use crate::errors::{ClientError, Result};
use crate::transport::{HttpResponse, HttpTransport, Transport};
use crate::types::results::{ErrorBody, QueryResponse, TopicsResponse};
use crate::types::{DocumentCatalog, QueryResultSet, UploadReceipt};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

/// Only plain-text documents are accepted for upload
pub const UPLOAD_EXTENSION: &str = ".txt";

const UPLOAD_FAILED: &str = "Upload failed";
const QUERY_FAILED: &str = "Query failed";
const TOPICS_FAILED: &str = "Failed to fetch topics";

/// Client for the retrieval backend
#[derive(Clone)]
pub struct RetrievalClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    max_responses: usize,
}

impl RetrievalClient {
    /// Create client over an explicit transport
    pub fn new(config: &RetrievalConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_responses: config.max_responses,
        }
    }

    /// Create client backed by reqwest
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::with_config(&config.http)?;
        Ok(Self::new(&config.retrieval, Arc::new(transport)))
    }

    /// List uploaded documents
    ///
    /// Any failure degrades to an empty catalog; this call only gates UI flow.
    pub async fn list_documents(&self) -> DocumentCatalog {
        let url = self.url("/get_existing_documents/");
        debug!(%url, "listing documents");

        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = ?err, "document listing unavailable");
                return DocumentCatalog::empty();
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "document listing returned error status");
            return DocumentCatalog::empty();
        }

        match serde_json::from_slice::<DocumentCatalog>(&response.body) {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(error = %err, "document listing body not understood");
                DocumentCatalog::empty()
            }
        }
    }

    /// Upload a plain-text document
    ///
    /// Non-`.txt` names are rejected before any request is sent.
    pub async fn upload_document(&self, content: Vec<u8>, file_name: &str) -> Result<UploadReceipt> {
        validate_upload_name(file_name)?;

        let url = self.url("/upload/");
        debug!(%url, file_name, bytes = content.len(), "uploading document");

        let response = self
            .transport
            .post_multipart(&url, UPLOAD_FIELD, file_name, content)
            .await
            .map_err(|e| e.for_operation(UPLOAD_FAILED))?;

        let receipt: UploadReceipt = parse_success(&response, UPLOAD_FAILED)?;
        info!(document_id = %receipt.document_id, "document uploaded");
        Ok(receipt)
    }

    /// Run a ranked query, returning results in backend order
    pub async fn query(&self, text: &str, max_responses: usize) -> Result<QueryResultSet> {
        if text.trim().is_empty() {
            return Err(ClientError::Input("Please enter a query".to_string()));
        }

        let url = self.url("/query/");
        debug!(%url, max_responses, "querying documents");

        let body = json!({
            "text": text,
            "max_responses": max_responses,
        });

        let response = self
            .transport
            .post_json(&url, &body)
            .await
            .map_err(|e| e.for_operation(QUERY_FAILED))?;

        let parsed: QueryResponse = parse_success(&response, QUERY_FAILED)?;
        debug!(results = parsed.responses.len(), "query answered");
        Ok(QueryResultSet::new(parsed.responses))
    }

    /// Run a ranked query with the configured result count
    pub async fn query_default(&self, text: &str) -> Result<QueryResultSet> {
        self.query(text, self.max_responses).await
    }

    /// Topics known to the backend
    pub async fn topics(&self) -> Result<Vec<String>> {
        let url = self.url("/topics/");
        debug!(%url, "fetching topics");

        let response = self
            .transport
            .get(&url)
            .await
            .map_err(|e| e.for_operation(TOPICS_FAILED))?;

        let parsed: TopicsResponse = parse_success(&response, TOPICS_FAILED)?;
        Ok(parsed.topics)
    }

    /// Configured result count
    pub fn max_responses(&self) -> usize {
        self.max_responses
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Reject file names the backend will not index
pub fn validate_upload_name(file_name: &str) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(ClientError::Input("Please select a file".to_string()));
    }
    if !file_name.ends_with(UPLOAD_EXTENSION) {
        return Err(ClientError::Input(
            "Only .txt files are supported".to_string(),
        ));
    }
    Ok(())
}

/// Decode a success body, or turn an error status into `Server`
fn parse_success<T>(response: &HttpResponse, fallback: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !response.is_success() {
        return Err(server_error(response, fallback));
    }

    serde_json::from_slice(&response.body).map_err(|err| {
        warn!(error = %err, status = response.status, "response body not understood");
        ClientError::Server {
            status: response.status,
            message: fallback.to_string(),
        }
    })
}

/// Server error carrying the body's `detail` text when present
pub(crate) fn server_error(response: &HttpResponse, fallback: &str) -> ClientError {
    let detail = serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.detail)
        .filter(|detail| !detail.trim().is_empty());

    ClientError::Server {
        status: response.status,
        message: detail.unwrap_or_else(|| fallback.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, SpyTransport};
    use crate::errors::ErrorKind;
    use bytes::Bytes;

    fn client_with(spy: Arc<SpyTransport>) -> RetrievalClient {
        RetrievalClient::new(&RetrievalConfig::default(), spy)
    }

    #[test]
    fn test_validate_upload_name() {
        assert!(validate_upload_name("handbook.txt").is_ok());

        let err = validate_upload_name("notes.md").unwrap_err();
        assert_eq!(err.to_string(), "Only .txt files are supported");
        assert_eq!(err.kind(), ErrorKind::Input);

        assert!(validate_upload_name("").is_err());
    }

    #[test]
    fn test_server_error_uses_detail() {
        let response = HttpResponse {
            status: 500,
            body: Bytes::from_static(br#"{"detail":"index unavailable"}"#),
        };
        assert_eq!(server_error(&response, QUERY_FAILED).to_string(), "index unavailable");
    }

    #[test]
    fn test_server_error_falls_back_on_non_json() {
        let response = HttpResponse {
            status: 502,
            body: Bytes::from_static(b"<html>Bad Gateway</html>"),
        };
        let err = server_error(&response, UPLOAD_FAILED);
        assert_eq!(err.to_string(), "Upload failed");
        assert!(matches!(err, ClientError::Server { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_whitespace_query_sends_nothing() {
        let spy = Arc::new(SpyTransport::new());
        let client = client_with(spy.clone());

        for text in ["", "   ", "\n\t"] {
            let err = client.query(text, 5).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Input);
        }
        assert_eq!(spy.call_count(), 0);
    }

    #[tokio::test]
    async fn test_query_sends_text_and_limit() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::json(
            200,
            json!({ "responses": [] }),
        )]));
        let client = client_with(spy.clone());

        let results = client.query("remote work", 3).await.unwrap();
        assert!(results.is_empty());

        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://localhost:8000/query/");
        assert_eq!(calls[0].json, Some(json!({ "text": "remote work", "max_responses": 3 })));
    }

    #[tokio::test]
    async fn test_query_transport_failure_message() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::refused()]));
        let client = client_with(spy);

        let err = client.query("overtime", 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "Query failed");
    }

    #[tokio::test]
    async fn test_list_documents_swallows_failures() {
        let spy = Arc::new(SpyTransport::with_script([
            Scripted::refused(),
            Scripted::json(500, json!({ "detail": "boom" })),
            Scripted::text(200, "not json"),
        ]));
        let client = client_with(spy.clone());

        for _ in 0..3 {
            assert_eq!(client.list_documents().await, DocumentCatalog::empty());
        }
        assert_eq!(spy.call_count(), 3);
    }

    #[tokio::test]
    async fn test_upload_rejects_markdown_before_request() {
        let spy = Arc::new(SpyTransport::new());
        let client = client_with(spy.clone());

        let err = client
            .upload_document(b"# Notes".to_vec(), "notes.md")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only .txt files are supported");
        assert_eq!(spy.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_sends_file_field() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::json(
            200,
            json!({ "message": "Document processed successfully", "doc_id": "leave_20240501_101500" }),
        )]));
        let client = client_with(spy.clone());

        let receipt = client
            .upload_document(b"Employees accrue leave.".to_vec(), "leave.txt")
            .await
            .unwrap();
        assert_eq!(receipt.document_id, "leave_20240501_101500");

        let calls = spy.calls();
        let call = &calls[0];
        assert_eq!(call.url, "http://localhost:8000/upload/");
        assert_eq!(call.field.as_deref(), Some(UPLOAD_FIELD));
        assert_eq!(call.file_name.as_deref(), Some("leave.txt"));
        assert_eq!(call.content.as_deref(), Some(&b"Employees accrue leave."[..]));
    }

    #[tokio::test]
    async fn test_query_default_uses_configured_limit() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::json(
            200,
            json!({ "responses": [] }),
        )]));
        let config = RetrievalConfig {
            max_responses: 7,
            ..RetrievalConfig::default()
        };
        let client = RetrievalClient::new(&config, spy.clone());

        client.query_default("overtime rules").await.unwrap();

        let calls = spy.calls();
        assert_eq!(calls[0].json, Some(json!({ "text": "overtime rules", "max_responses": 7 })));
    }

    #[tokio::test]
    async fn test_upload_transport_failure_message() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::refused()]));
        let client = client_with(spy.clone());

        let err = client
            .upload_document(b"Employees accrue leave.".to_vec(), "leave.txt")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "Upload failed");
        assert_eq!(spy.call_count(), 1);
    }

    #[tokio::test]
    async fn test_topics_error_fallback() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::text(503, "")]));
        let client = client_with(spy);

        let err = client.topics().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch topics");
    }
}
