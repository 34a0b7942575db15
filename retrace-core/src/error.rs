//! Error types for Retrace operations

/// Result type for Retrace operations
pub type Result<T> = std::result::Result<T, RetraceError>;

/// Error types for the recorder, the record log and the playback bridge
#[derive(Debug, thiserror::Error)]
pub enum RetraceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Message could not be delivered to the renderer
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Record log is malformed
    #[error("Record log error: {0}")]
    RecordLog(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for RetraceError {
    fn from(s: String) -> Self {
        RetraceError::Other(s)
    }
}

impl From<&str> for RetraceError {
    fn from(s: &str) -> Self {
        RetraceError::Other(s.to_string())
    }
}
