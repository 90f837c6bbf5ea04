use thiserror::Error;

/// Main error type for GraphRAG
#[derive(Error, Debug)]
pub enum GraphRagError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unserializable JSON (persisted graph documents)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding collaborator errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// NER collaborator errors
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Parse errors (inconsistent persisted graph, text slicing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Auxiliary graph export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using GraphRagError
pub type Result<T> = std::result::Result<T, GraphRagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphRagError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: GraphRagError = json_err.into();
        assert!(matches!(err, GraphRagError::Json(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GraphRagError = io_err.into();
        assert!(matches!(err, GraphRagError::Io(_)));
    }
}
