//! Notification Fan-Out
//!
//! Turns each newly created alert into one in-app notification per
//! privileged user. Fan-out runs on a worker pool fed by a bounded queue so
//! alert creation never waits on it.

mod dispatcher;
mod fanout;
mod inbox;

pub use dispatcher::{DispatcherConfig, NotificationDispatcher, WorkerPool};
pub use fanout::FanOut;
pub use inbox::Inbox;

use storage::StorageError;
use thiserror::Error;

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Absent, or owned by someone else
    #[error("Notification not found")]
    NotFound,

    #[error("Service unavailable")]
    Unavailable(#[from] StorageError),

    /// The dispatcher's workers have shut down
    #[error("Fan-out queue is closed")]
    QueueClosed,
}
