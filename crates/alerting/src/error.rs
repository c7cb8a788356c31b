//! Alerting error types

use storage::StorageError;
use thiserror::Error;

/// Errors from alert operations
#[derive(Debug, Error)]
pub enum AlertError {
    /// Malformed input: missing field or value outside its enumeration
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Absent, or hidden from the caller by visibility rules
    #[error("Alert not found")]
    NotFound,

    /// The caller's role may not perform the operation
    #[error("Operation requires a privileged role")]
    Forbidden,

    /// Lost an admission race on the same wetland and category
    #[error("Conflicting concurrent admission")]
    Conflict,

    /// Storage failure; details stay in the logs
    #[error("Service unavailable")]
    Unavailable(#[source] StorageError),
}

impl From<StorageError> for AlertError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(_) => AlertError::Conflict,
            other => AlertError::Unavailable(other),
        }
    }
}
