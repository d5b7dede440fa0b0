//! Error types for backend queries

use thiserror::Error;

/// Failures reported by a backend driver
///
/// These never leave the evaluator: any of them turns the pending conditional
/// requirement into a denial.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend connection failed: {0}")]
    Connection(String),

    #[error("Backend query failed: {0}")]
    Query(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

/// Result type for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;
