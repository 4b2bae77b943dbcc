use crate::DocId;
use thiserror::Error;

/// Failure scoped to a single record. Batch operations collect these and keep going.
#[derive(Debug, Error)]
pub enum DocError {
    #[error("line {line}: not valid UTF-8")]
    Encoding { line: usize },

    #[error("line {line}: malformed record: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("document {doc_id}: review {review} has a non-numeric rating ({value})")]
    Rating { doc_id: DocId, review: usize, value: serde_json::Value },

    #[error("document {doc_id}: review {review} is not an object")]
    Review { doc_id: DocId, review: usize },
}

impl DocError {
    /// Input line the error refers to, when it came from the loader.
    pub fn line(&self) -> Option<usize> {
        match self {
            DocError::Encoding { line } | DocError::Malformed { line, .. } => Some(*line),
            _ => None,
        }
    }
}
