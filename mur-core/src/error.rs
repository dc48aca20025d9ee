/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the mur learning layer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("security violation: {0}")]
    Security(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is recoverable (can retry with backoff)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::NotFound(_) => false,
            Error::Validation(_) => false,
            Error::Integrity(_) => false,
            Error::Provider(_) => true,
            Error::Security(_) => false,
            Error::Cancelled => false,
            Error::Timeout(_) => true,
            Error::Yaml(_) => false,
            Error::Serialization(_) => false,
            Error::Database(_) => true,
            Error::Io(_) => true,
        }
    }

    /// Check if this error is fatal to a single-call boundary
    ///
    /// Batch operations collect per-item errors instead of aborting; only
    /// validation and security failures hard-fail an individual call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Security(_))
    }
}
