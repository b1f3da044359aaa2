//! Retrieval data model
//!
//! Wire shapes returned by the retrieval backend, plus the immutable result
//! set handed to callers.

use serde::{Deserialize, Serialize};

/// One ranked passage returned by a query
///
/// `score` is whatever the backend assigned; no range is assumed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub statement: String,
    pub score: f64,
    pub source: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Ordered results of a single query, in backend order
///
/// There is no mutable access; a new query produces a new set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResultSet {
    results: Vec<RetrievalResult>,
}

impl QueryResultSet {
    pub fn new(results: Vec<RetrievalResult>) -> Self {
        Self { results }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievalResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[RetrievalResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_vec(self) -> Vec<RetrievalResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a QueryResultSet {
    type Item = &'a RetrievalResult;
    type IntoIter = std::slice::Iter<'a, RetrievalResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Documents known to the retrieval backend
///
/// Only used to decide whether anything has been uploaded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCatalog {
    #[serde(default)]
    pub files: Vec<String>,
}

impl DocumentCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_documents(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Acknowledgement of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    #[serde(rename = "doc_id")]
    pub document_id: String,
}

/// `POST /query/` response body
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub responses: Vec<RetrievalResult>,
}

/// `GET /topics/` response body
#[derive(Debug, Deserialize)]
pub(crate) struct TopicsResponse {
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Error body used by the retrieval backend for non-success responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_deserializes_with_missing_optional_lists() {
        let json = r#"{"statement": "Leave accrues monthly.", "score": 3.5, "source": "hr_2024"}"#;
        let result: RetrievalResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.statement, "Leave accrues monthly.");
        assert_eq!(result.score, 3.5);
        assert!(result.context.is_empty());
        assert!(result.topics.is_empty());
    }

    #[test]
    fn test_upload_receipt_maps_doc_id() {
        let json = r#"{"message": "Document processed successfully", "doc_id": "notes_20240101_120000"}"#;
        let receipt: UploadReceipt = serde_json::from_str(json).unwrap();

        assert_eq!(receipt.document_id, "notes_20240101_120000");
    }

    #[test]
    fn test_catalog_has_documents() {
        assert!(!DocumentCatalog::empty().has_documents());

        let catalog = DocumentCatalog {
            files: vec!["handbook.txt".to_string()],
        };
        assert!(catalog.has_documents());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_result_set_preserves_order() {
        let make = |statement: &str, score: f64| RetrievalResult {
            statement: statement.to_string(),
            score,
            source: "doc".to_string(),
            context: Vec::new(),
            topics: Vec::new(),
        };
        let set = QueryResultSet::new(vec![make("b", 0.1), make("a", 0.9)]);

        let statements: Vec<&str> = set.iter().map(|r| r.statement.as_str()).collect();
        assert_eq!(statements, vec!["b", "a"]);
    }
}
