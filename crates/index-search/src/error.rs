//! Search error types.

use index_types::IndexError;
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Query parse error
    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record or state JSON could not be read/written
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index is locked (another process has it open)
    #[error("Index is locked: {0}")]
    IndexLocked(String),

    /// Record cannot be indexed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Index id already registered
    #[error("Index already registered: {0}")]
    AlreadyRegistered(String),
}

impl From<SearchError> for IndexError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Io(e) => IndexError::Io(e),
            SearchError::Serialization(e) => IndexError::Serialization(e),
            SearchError::InvalidRecord(msg) => IndexError::InvalidRecord(msg),
            other => IndexError::Backend(other.to_string()),
        }
    }
}
