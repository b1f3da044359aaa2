//! Streaming client module
//!
//! Provides the Ollama generation client, the incremental NDJSON decoder,
//! and the summary event stream built on top of them.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod summary;

// Re-export commonly used types
pub use client::GenerationClient;
pub use parser::{GenerateChunk, LineDecoder, MAX_BUFFER_SIZE};
pub use prompt::build_prompt;
pub use summary::{CancelHandle, SummaryObserver, SummaryState, SummaryStream};
