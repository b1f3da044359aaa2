//! Test utilities for policyrag
//!
//! [`SpyTransport`] replays scripted responses and records every call, so
//! tests can assert both on what a client returned and on what it sent (or
//! did not send).

use crate::errors::{ClientError, Result};
use crate::transport::{HttpResponse, StreamingResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request observed by the spy
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub json: Option<serde_json::Value>,
    pub file_name: Option<String>,
    pub field: Option<String>,
    pub content: Option<Vec<u8>>,
}

/// Scripted reply for the next call
pub enum Scripted {
    Response(HttpResponse),
    Stream {
        status: u16,
        chunks: Vec<Result<Bytes>>,
        /// Never end the body after the scripted chunks
        hang: bool,
    },
    Fail(ClientError),
}

impl Scripted {
    /// JSON response with the given status
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Scripted::Response(HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        })
    }

    /// Plain-text response with the given status
    pub fn text(status: u16, body: &str) -> Self {
        Scripted::Response(HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        })
    }

    /// Successful streaming body delivered as the given chunks
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Scripted::Stream {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_ref())))
                .collect(),
            hang: false,
        }
    }

    /// Refused connection
    pub fn refused() -> Self {
        Scripted::Fail(ClientError::transport(
            "Request failed",
            "tcp connect error: Connection refused (os error 111)",
        ))
    }
}

/// In-memory [`Transport`] that records calls and replays scripts in order
#[derive(Default)]
pub struct SpyTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl SpyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spy pre-loaded with a sequence of replies
    pub fn with_script(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("spy calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("spy calls lock").len()
    }

    fn record(&self, call: RecordedCall) -> Option<Scripted> {
        self.calls.lock().expect("spy calls lock").push(call);
        self.script.lock().expect("spy script lock").pop_front()
    }

    fn unscripted(url: &str) -> ClientError {
        ClientError::transport("Request failed", format!("no scripted reply for {}", url))
    }

    fn buffered(reply: Option<Scripted>, url: &str) -> Result<HttpResponse> {
        match reply {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Stream { status, chunks, .. }) => {
                let mut body = Vec::new();
                for chunk in chunks {
                    body.extend_from_slice(&chunk?);
                }
                Ok(HttpResponse {
                    status,
                    body: Bytes::from(body),
                })
            }
            None => Err(Self::unscripted(url)),
        }
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let reply = self.record(RecordedCall {
            method: "GET",
            url: url.to_string(),
            json: None,
            file_name: None,
            field: None,
            content: None,
        });
        Self::buffered(reply, url)
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse> {
        let reply = self.record(RecordedCall {
            method: "POST",
            url: url.to_string(),
            json: Some(body.clone()),
            file_name: None,
            field: None,
            content: None,
        });
        Self::buffered(reply, url)
    }

    async fn post_multipart(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<HttpResponse> {
        let reply = self.record(RecordedCall {
            method: "POST",
            url: url.to_string(),
            json: None,
            file_name: Some(file_name.to_string()),
            field: Some(field.to_string()),
            content: Some(content),
        });
        Self::buffered(reply, url)
    }

    async fn post_json_stream(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<StreamingResponse> {
        let reply = self.record(RecordedCall {
            method: "POST",
            url: url.to_string(),
            json: Some(body.clone()),
            file_name: None,
            field: None,
            content: None,
        });

        match reply {
            Some(Scripted::Stream {
                status,
                chunks,
                hang,
            }) => {
                let scripted = stream::iter(chunks);
                let body = if hang {
                    scripted.chain(stream::pending()).boxed()
                } else {
                    scripted.boxed()
                };
                Ok(StreamingResponse { status, body })
            }
            Some(Scripted::Response(response)) => Ok(StreamingResponse {
                status: response.status,
                body: stream::once(async move { Ok(response.body) }).boxed(),
            }),
            Some(Scripted::Fail(err)) => Err(err),
            None => Err(Self::unscripted(url)),
        }
    }
}
