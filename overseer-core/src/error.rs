//! Error types for Overseer core operations

/// Result type for Overseer core operations
pub type Result<T> = std::result::Result<T, OverseerError>;

/// Error types shared by the Overseer crates
#[derive(Debug, thiserror::Error)]
pub enum OverseerError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

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

impl From<String> for OverseerError {
    fn from(s: String) -> Self {
        OverseerError::Other(s)
    }
}

impl From<&str> for OverseerError {
    fn from(s: &str) -> Self {
        OverseerError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for OverseerError {
    fn from(err: anyhow::Error) -> Self {
        OverseerError::Other(err.to_string())
    }
}

impl From<figment::Error> for OverseerError {
    fn from(err: figment::Error) -> Self {
        OverseerError::Configuration(err.to_string())
    }
}
