//! Retrieval client module
//!
//! Document listing, upload, and ranked queries against the index service.

pub mod client;

// Re-export commonly used types
pub use client::{validate_upload_name, RetrievalClient, UPLOAD_EXTENSION, UPLOAD_FIELD};
