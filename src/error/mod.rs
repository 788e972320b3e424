//! Error types for the similarity search subsystem

use thiserror::Error;

/// Result type alias for similarity search operations
pub type Result<T> = std::result::Result<T, SimilarityError>;

/// Main error type for the similarity search subsystem
///
/// An `Err` always means "the search could not be completed". An empty
/// result set is never reported through this type.
#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Similarity service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while talking to the analytical warehouse
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Warehouse API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Warehouse rejected credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Failed to obtain warehouse credentials: {0}")]
    Auth(String),

    #[error("Query did not complete within {timeout_ms} ms")]
    Incomplete { timeout_ms: u64 },

    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the remote scoring service client
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Http(reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl SimilarityError {
    /// True when the failure came from a transport or infrastructure problem
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SimilarityError::Service(
                ServiceError::Http(_) | ServiceError::Timeout(_) | ServiceError::Unavailable(_)
            ) | SimilarityError::Warehouse(WarehouseError::Http(_))
        )
    }
}

impl From<config::ConfigError> for SimilarityError {
    fn from(err: config::ConfigError) -> Self {
        SimilarityError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        let err = SimilarityError::from(ServiceError::Unavailable("circuit open".to_string()));
        assert!(err.is_unavailable());

        let err = SimilarityError::from(ServiceError::Status {
            status: 500,
            body: "boom".to_string(),
        });
        assert!(!err.is_unavailable());
        assert_eq!(err.to_string(), "Similarity service error: Service returned 500: boom");
    }
}
