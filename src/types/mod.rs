//! Type definitions module
//!
//! Retrieval results and summary stream events shared by both clients.

pub mod results;

// Re-export commonly used types
pub use results::{DocumentCatalog, QueryResultSet, RetrievalResult, UploadReceipt};

// Streaming event types
pub mod events;
pub use events::{StreamOutcome, StreamToken, SummaryEvent};
