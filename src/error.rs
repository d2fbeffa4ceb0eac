//! Error handling module
//!
//! Provides the unified error type shared by every engine component.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Catalog query timed out after {timeout_secs}s: {context}")]
    QueryTimeout { timeout_secs: u64, context: String },

    #[error("Read-only contract violation: {0}")]
    ReadOnlyViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for connectivity-class failures (unreachable database,
    /// authentication, pool exhaustion). These are fatal for the current run
    /// and are never retried inside the engine.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, EngineError::Connection(_) | EngineError::Pool(_))
    }
}

/// Result type alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> EngineError {
    EngineError::NotFound(msg.into())
}

/// Helper function to create a configuration error
pub fn config_error(msg: impl Into<String>) -> EngineError {
    EngineError::Config(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(EngineError::Connection("refused".to_string()).is_connectivity());
        assert!(!EngineError::NotFound("users".to_string()).is_connectivity());
        assert!(!EngineError::QueryTimeout {
            timeout_secs: 30,
            context: "listing tables".to_string(),
        }
        .is_connectivity());
    }

    #[test]
    fn test_not_found_message() {
        let err = not_found_error("Table 'missing' does not exist in schema 'public'");
        assert_eq!(
            err.to_string(),
            "Not found: Table 'missing' does not exist in schema 'public'"
        );
    }
}
