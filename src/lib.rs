//! policyrag - Policy document retrieval and streaming summaries
//!
//! Client layer for a document-retrieval-and-summarization setup:
//!
//! - **Retrieval**: list, upload, and query documents on the index service
//! - **Streaming**: decode the generation backend's NDJSON token stream into
//!   ordered summary events, with callbacks and cancellation
//! - **Transport**: injectable HTTP seam (reqwest in production)

pub mod errors;
pub mod types;
pub mod transport;
pub mod config;

// Re-export commonly used types
pub use errors::{ClientError, ErrorKind, Result};

pub mod retrieval;
pub mod streaming;

pub use retrieval::RetrievalClient;
pub use streaming::{CancelHandle, GenerationClient, SummaryObserver, SummaryStream};

// Command-line front-end
pub mod cli;

// Scripted transport for tests and demos
pub mod testing;
