//! Error types for ReadKey.

use thiserror::Error;

/// Common error type for ReadKey.
#[derive(Error, Debug)]
pub enum ReadkeyError {
    /// Feed fetch error.
    ///
    /// Covers rejected URLs, network failures and unparseable documents.
    #[error("feed fetch error: {0}")]
    Fetch(String),

    /// Storage collaborator error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Keyword service error.
    #[error("keyword service error: {0}")]
    Keyword(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error for persisted values.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The registry no longer accepts work.
    #[error("registry is shutting down")]
    Shutdown,
}

/// Result type alias for ReadKey operations.
pub type Result<T> = std::result::Result<T, ReadkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = ReadkeyError::Fetch("HTTP error: 404 Not Found".to_string());
        assert_eq!(err.to_string(), "feed fetch error: HTTP error: 404 Not Found");
    }

    #[test]
    fn test_storage_error_display() {
        let err = ReadkeyError::Storage("connection reset".to_string());
        assert_eq!(err.to_string(), "storage error: connection reset");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = ReadkeyError::NotFound("feed item".to_string());
        assert_eq!(err.to_string(), "feed item not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReadkeyError = io_err.into();
        assert!(matches!(err, ReadkeyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: ReadkeyError = json_err.into();
        assert!(matches!(err, ReadkeyError::Serialization(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(ReadkeyError::Shutdown)
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
