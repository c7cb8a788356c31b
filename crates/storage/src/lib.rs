//! Storage Layer
//!
//! Alert ledger, notification inbox and telemetry persistence behind
//! repository traits, with an in-memory and a SQLite implementation.

mod model;
mod repository;
mod sqlite;
mod store;

pub use model::{
    Actor, Alert, AlertFilter, AlertSummary, Category, Channel, InvalidValue, NewAlert,
    NewNotification, Notification, NotificationFilter, Reading, Role, Severity,
};
pub use repository::Repository;
pub use sqlite::SqliteRepository;
pub use store::{AlertStore, TelemetryStore, UserDirectory};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<InvalidValue> for StorageError {
    fn from(e: InvalidValue) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}
