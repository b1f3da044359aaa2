//! Summary stream: NDJSON chunks in, ordered events out
//!
//! A [`SummaryStream`] is lazy (nothing is sent until the first event is
//! requested), finite, and not restartable. Its lifecycle:
//!
//! ```text
//! Idle → Requesting → Streaming ⟲ → Completed | Failed
//!                 ↘ (cancel at any await point) → Cancelled
//! ```
//!
//! Exactly one terminal event (`Completed` or `Failed`) is yielded unless the
//! stream is cancelled first, in which case none is. Nothing is yielded after
//! a terminal event.

use crate::errors::{ClientError, Result};
use crate::streaming::parser::{parse_chunk, LineDecoder};
use crate::transport::{ByteStream, Transport};
use crate::types::SummaryEvent;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Message used when the generation backend cannot be reached
pub const CONNECT_FAILED: &str = "Failed to connect to generation service";

/// Message used when the connection drops mid-stream
pub const STREAM_INTERRUPTED: &str = "Connection to generation service lost";

/// Lifecycle phase of a summary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SummaryState {
    /// Whether no further events can be produced
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SummaryState::Completed | SummaryState::Failed | SummaryState::Cancelled
        )
    }
}

/// Cancellation signal shared between a caller and a running stream
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the stream to stop; idempotent
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Optional callbacks invoked while a summary streams
#[derive(Default)]
pub struct SummaryObserver {
    on_token: Option<Box<dyn FnMut(&str) + Send>>,
    on_complete: Option<Box<dyn FnMut(&str) + Send>>,
    on_error: Option<Box<dyn FnMut(&ClientError) + Send>>,
}

impl SummaryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_token(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_token = Some(Box::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Drain `stream`, dispatching each event to the matching callback
    ///
    /// Returns the full text on completion and the error on failure, so a
    /// caller that only awaits still sees the outcome. A cancelled stream
    /// returns [`ClientError::Cancelled`] without invoking `on_error`.
    pub async fn observe(mut self, mut stream: SummaryStream) -> Result<String> {
        while let Some(event) = stream.next_event().await {
            match event {
                SummaryEvent::Token(text) => {
                    if let Some(callback) = self.on_token.as_mut() {
                        callback(&text);
                    }
                }
                SummaryEvent::Completed(full_text) => {
                    if let Some(callback) = self.on_complete.as_mut() {
                        callback(&full_text);
                    }
                    return Ok(full_text);
                }
                SummaryEvent::Failed(err) => {
                    if let Some(callback) = self.on_error.as_mut() {
                        callback(&err);
                    }
                    return Err(err);
                }
            }
        }

        Err(ClientError::Cancelled)
    }
}

/// In-band error body of the generation backend (`{"error": "..."}`)
#[derive(Debug, Deserialize)]
struct GenerateErrorBody {
    error: Option<String>,
}

/// One summary request and its decoded response
pub struct SummaryStream {
    transport: Arc<dyn Transport>,
    url: String,
    request: serde_json::Value,
    cancel: CancelHandle,

    state: SummaryState,
    status: u16,
    body: Option<ByteStream>,
    decoder: LineDecoder,
    full_response: String,
    tokens: usize,

    /// Events decoded but not yet handed out; a terminal event is always last
    queued: VecDeque<SummaryEvent>,
}

impl SummaryStream {
    /// Prepare a stream; no request is sent until it is polled
    pub fn new(
        transport: Arc<dyn Transport>,
        url: String,
        request: serde_json::Value,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            transport,
            url,
            request,
            cancel,
            state: SummaryState::Idle,
            status: 0,
            body: None,
            decoder: LineDecoder::new(),
            full_response: String::new(),
            tokens: 0,
            queued: VecDeque::new(),
        }
    }

    /// Current lifecycle phase
    pub fn state(&self) -> SummaryState {
        self.state
    }

    /// Next event, or `None` once the stream is finished or cancelled
    pub async fn next_event(&mut self) -> Option<SummaryEvent> {
        loop {
            if self.state.is_finished() {
                return None;
            }

            if self.cancel.is_cancelled() {
                self.abandon();
                return None;
            }

            if let Some(event) = self.queued.pop_front() {
                match &event {
                    SummaryEvent::Token(_) => {}
                    SummaryEvent::Completed(_) => self.state = SummaryState::Completed,
                    SummaryEvent::Failed(_) => self.state = SummaryState::Failed,
                }
                return Some(event);
            }

            match self.state {
                SummaryState::Idle => self.open().await,
                SummaryState::Streaming => self.read_chunk().await,
                _ => return None,
            }
        }
    }

    /// Consume into a `Stream` of events
    pub fn into_events(self) -> BoxStream<'static, SummaryEvent> {
        stream::unfold(self, |mut summary| async move {
            summary.next_event().await.map(|event| (event, summary))
        })
        .boxed()
    }

    async fn open(&mut self) {
        self.state = SummaryState::Requesting;
        debug!(url = %self.url, "opening summary stream");

        let cancel = self.cancel.clone();
        let transport = Arc::clone(&self.transport);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transport.post_json_stream(&self.url, &self.request) => Some(result),
        };

        let response = match opened {
            None => return self.abandon(),
            Some(Err(err)) => return self.fail(err.for_operation(CONNECT_FAILED)),
            Some(Ok(response)) => response,
        };

        self.status = response.status;
        if !response.is_success() {
            let status = response.status;
            let drained = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                body = response.collect_body() => Some(body),
            };

            let message = match drained {
                None => return self.abandon(),
                Some(Ok(body)) => serde_json::from_slice::<GenerateErrorBody>(&body)
                    .ok()
                    .and_then(|b| b.error)
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| CONNECT_FAILED.to_string()),
                Some(Err(_)) => CONNECT_FAILED.to_string(),
            };
            return self.fail(ClientError::Server { status, message });
        }

        self.body = Some(response.body);
        self.state = SummaryState::Streaming;
    }

    async fn read_chunk(&mut self) {
        let Some(body) = self.body.as_mut() else {
            return self.fail(ClientError::Protocol("response body unavailable".to_string()));
        };

        let cancel = self.cancel.clone();
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = body.next() => Some(chunk),
        };

        match next {
            None => self.abandon(),
            Some(Some(Ok(bytes))) => match self.decoder.push(&bytes) {
                Ok(lines) => {
                    for line in lines {
                        if self.ingest_line(&line) {
                            return;
                        }
                    }
                    if let Err(err) = self.decoder.check() {
                        self.fail(err);
                    }
                }
                Err(err) => self.fail(err),
            },
            Some(Some(Err(err))) => self.fail(err.for_operation(STREAM_INTERRUPTED)),
            Some(None) => {
                if let Some(line) = self.decoder.finish() {
                    if self.ingest_line(&line) {
                        return;
                    }
                }
                self.fail(ClientError::Protocol(
                    "stream ended before completion".to_string(),
                ));
            }
        }
    }

    /// Handle one complete line; returns true once a terminal event is queued
    fn ingest_line(&mut self, line: &str) -> bool {
        let chunk = match parse_chunk(line) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.fail(err);
                return true;
            }
        };

        if let Some(message) = chunk.error.filter(|e| !e.trim().is_empty()) {
            self.fail(ClientError::Server {
                status: self.status,
                message,
            });
            return true;
        }

        if !chunk.response.is_empty() {
            self.full_response.push_str(&chunk.response);
            self.tokens += 1;
            self.queued.push_back(SummaryEvent::Token(chunk.response));
        }

        if chunk.done {
            info!(tokens = self.tokens, chars = self.full_response.len(), "summary completed");
            self.release();
            let full_text = std::mem::take(&mut self.full_response);
            self.queued.push_back(SummaryEvent::Completed(full_text));
            return true;
        }

        false
    }

    fn fail(&mut self, err: ClientError) {
        warn!(error = ?err, "summary stream failed");
        self.release();
        self.queued.push_back(SummaryEvent::Failed(err));
    }

    fn abandon(&mut self) {
        debug!("summary stream cancelled");
        self.release();
        self.queued.clear();
        self.state = SummaryState::Cancelled;
    }

    /// Drop the transport body and any partial input
    fn release(&mut self) {
        self.body = None;
        self.decoder.clear();
    }
}
