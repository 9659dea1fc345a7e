//! Error types shared across the artifact index crates.

use thiserror::Error;

/// Unified error type for index access operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A record is missing a required field or carries a wrong type
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Failure reported by the index engine behind an accessor
    #[error("Index backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::InvalidRecord("missing uinfo".to_string());
        assert_eq!(err.to_string(), "Invalid record: missing uinfo");

        let err = IndexError::Backend("reader closed".to_string());
        assert_eq!(err.to_string(), "Index backend error: reader closed");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: IndexError = io.into();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
