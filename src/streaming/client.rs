//! Ollama generation client
//!
//! Streams summaries from the generation backend:
//! - Endpoint: POST /api/generate, `{ model, prompt, stream: true }`
//! - Response: NDJSON records `{ response, done, ... }`
//! - No request timeout; cancellation goes through [`CancelHandle`]

use crate::config::{Config, GenerationConfig};
use crate::errors::Result;
use crate::streaming::prompt::build_prompt;
use crate::streaming::summary::{CancelHandle, SummaryObserver, SummaryStream};
use crate::transport::{HttpTransport, Transport};
use crate::types::RetrievalResult;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Ollama generation client
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    model: String,
}

impl GenerationClient {
    /// Create client over an explicit transport
    pub fn new(config: &GenerationConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Create client backed by reqwest
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::with_config(&config.http)?;
        Ok(Self::new(&config.generation, Arc::new(transport)))
    }

    /// Prepare a streamed generation for a raw prompt
    ///
    /// Nothing is sent until the returned stream is first polled.
    pub fn generate_stream(&self, prompt: String, cancel: CancelHandle) -> SummaryStream {
        let url = format!("{}/api/generate", self.base_url);

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
        });

        debug!(%url, model = %self.model, "prepared generate request");
        SummaryStream::new(Arc::clone(&self.transport), url, body, cancel)
    }

    /// Prepare a streamed summary of `results` answering `query`
    pub fn summary_stream(
        &self,
        results: &[RetrievalResult],
        query: &str,
        cancel: CancelHandle,
    ) -> SummaryStream {
        self.generate_stream(build_prompt(query, results), cancel)
    }

    /// Stream a summary, reporting progress through `observer`
    ///
    /// Resolves with the full text, or with the same error passed to
    /// `on_error`.
    pub async fn summarize(
        &self,
        results: &[RetrievalResult],
        query: &str,
        observer: SummaryObserver,
        cancel: CancelHandle,
    ) -> Result<String> {
        observer
            .observe(self.summary_stream(results, query, cancel))
            .await
    }

    /// Check if the generation backend answers
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);

        match self.transport.get(&url).await {
            Ok(response) => response.is_success(),
            Err(_) => false,
        }
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, SpyTransport};

    fn client_with(spy: Arc<SpyTransport>) -> GenerationClient {
        GenerationClient::new(&GenerationConfig::default(), spy)
    }

    #[test]
    fn test_client_with_config() {
        let config = GenerationConfig {
            base_url: "http://gpu-box:11434/".to_string(),
            model: "llama2:7b".to_string(),
        };
        let client = GenerationClient::new(&config, Arc::new(SpyTransport::new()));

        assert_eq!(client.model(), "llama2:7b");
        assert_eq!(client.base_url(), "http://gpu-box:11434");
    }

    #[tokio::test]
    async fn test_request_body() {
        let spy = Arc::new(SpyTransport::with_script([Scripted::chunks(["{\"done\":true}\n"])]));
        let client = client_with(spy.clone());

        let results = vec![RetrievalResult {
            statement: "Remote work requires manager approval.".to_string(),
            score: 0.8,
            source: "handbook".to_string(),
            context: Vec::new(),
            topics: Vec::new(),
        }];
        let full = client
            .summarize(&results, "remote work", SummaryObserver::new(), CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(full, "");

        let calls = spy.calls();
        let call = &calls[0];
        assert_eq!(call.url, "http://localhost:11434/api/generate");
        let body = call.json.as_ref().unwrap();
        assert_eq!(body["model"], json!("llama3.2"));
        assert_eq!(body["stream"], json!(true));
        assert_eq!(
            body["prompt"],
            json!(build_prompt("remote work", &results))
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let spy = Arc::new(SpyTransport::with_script([
            Scripted::json(200, json!({ "version": "0.3.12" })),
            Scripted::refused(),
        ]));
        let client = client_with(spy);

        assert!(client.health_check().await);
        assert!(!client.health_check().await);
    }
}
