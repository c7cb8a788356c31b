//! Broadcast Registry
//!
//! Tracks live observer connections and pushes best-effort events to them.
//! The registry is an actor: register, unregister and broadcast are
//! commands on one channel, processed one at a time.

mod event;
mod registry;

pub use event::{BroadcastEvent, EventKind};
pub use registry::{BroadcastRegistry, BroadcastReport, Observer, ObserverId, RegistryConfig};

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry actor has stopped")]
    Stopped,
}
