//! Registry actor and observer handles

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::BroadcastEvent;
use crate::RegistryError;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Pending commands the actor will queue before `publish` starts dropping events
    pub command_capacity: usize,
    /// Events buffered per observer; an observer that falls this far behind is dropped
    pub observer_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command_capacity: 256,
            observer_buffer: 32,
        }
    }
}

/// Identity of a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers the event was queued for
    pub delivered: usize,
    /// Observers whose delivery failed and who were unregistered
    pub dropped: Vec<ObserverId>,
}

/// Commands processed by the registry actor
enum RegistryCommand {
    Register {
        sink: mpsc::Sender<BroadcastEvent>,
        reply: oneshot::Sender<ObserverId>,
    },
    Unregister {
        id: ObserverId,
        reply: Option<oneshot::Sender<bool>>,
    },
    Broadcast {
        event: BroadcastEvent,
        reply: Option<oneshot::Sender<BroadcastReport>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// A connected observer's end of the registry
///
/// Dropping it unregisters the observer.
pub struct Observer {
    id: ObserverId,
    events: mpsc::Receiver<BroadcastEvent>,
    registry: mpsc::Sender<RegistryCommand>,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next event, or `None` once the observer has been unregistered
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.events.recv().await
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        // try_send: with the command queue full this unregister is lost, and
        // the observer stays registered until the next broadcast fails to
        // reach its closed channel
        let _ = self.registry.try_send(RegistryCommand::Unregister {
            id: self.id,
            reply: None,
        });
    }
}

/// Handle to the registry actor
#[derive(Clone)]
pub struct BroadcastRegistry {
    tx: mpsc::Sender<RegistryCommand>,
    observer_buffer: usize,
}

impl BroadcastRegistry {
    /// Spawn the registry actor
    pub fn spawn(config: RegistryConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        tokio::spawn(actor_loop(rx));

        info!(
            "Broadcast registry spawned (command capacity {}, observer buffer {})",
            config.command_capacity, config.observer_buffer
        );
        Self {
            tx,
            observer_buffer: config.observer_buffer.max(1),
        }
    }

    /// Register an event sink. Delivery failure to it unregisters it.
    pub async fn register(
        &self,
        sink: mpsc::Sender<BroadcastEvent>,
    ) -> Result<ObserverId, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Register { sink, reply: reply_tx })
            .await
            .map_err(|_| RegistryError::Stopped)?;
        reply_rx.await.map_err(|_| RegistryError::Stopped)
    }

    /// Open a new observer with its own bounded event buffer
    pub async fn connect(&self) -> Result<Observer, RegistryError> {
        let (sink, events) = mpsc::channel(self.observer_buffer);
        let id = self.register(sink).await?;
        Ok(Observer {
            id,
            events,
            registry: self.tx.clone(),
        })
    }

    /// Remove an observer. Returns false if it was already gone.
    pub async fn unregister(&self, id: ObserverId) -> Result<bool, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Unregister {
                id,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| RegistryError::Stopped)?;
        reply_rx.await.map_err(|_| RegistryError::Stopped)
    }

    /// Deliver to every observer and report who received it
    pub async fn broadcast(&self, event: BroadcastEvent) -> Result<BroadcastReport, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Broadcast {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| RegistryError::Stopped)?;
        reply_rx.await.map_err(|_| RegistryError::Stopped)
    }

    /// Fire-and-forget broadcast. The event is dropped if the actor is saturated.
    pub fn publish(&self, event: BroadcastEvent) {
        let kind = event.kind;
        if let Err(e) = self.tx.try_send(RegistryCommand::Broadcast { event, reply: None }) {
            warn!(?kind, "Broadcast event dropped: {}", e);
        }
    }

    pub async fn observer_count(&self) -> Result<usize, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Count { reply: reply_tx })
            .await
            .map_err(|_| RegistryError::Stopped)?;
        reply_rx.await.map_err(|_| RegistryError::Stopped)
    }
}

async fn actor_loop(mut rx: mpsc::Receiver<RegistryCommand>) {
    let mut observers: HashMap<ObserverId, mpsc::Sender<BroadcastEvent>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Register { sink, reply } => {
                let id = ObserverId::new();
                observers.insert(id, sink);
                debug!(%id, observers = observers.len(), "Observer registered");
                metrics::gauge!("broadcast_observers").set(observers.len() as f64);
                let _ = reply.send(id);
            }

            RegistryCommand::Unregister { id, reply } => {
                let removed = observers.remove(&id).is_some();
                if removed {
                    debug!(%id, observers = observers.len(), "Observer unregistered");
                    metrics::gauge!("broadcast_observers").set(observers.len() as f64);
                }
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }

            RegistryCommand::Broadcast { event, reply } => {
                let report = deliver(&mut observers, &event);
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }

            RegistryCommand::Count { reply } => {
                let _ = reply.send(observers.len());
            }
        }
    }

    debug!("Broadcast registry actor stopped");
}

/// Queue the event for every observer, dropping those that cannot take it
fn deliver(
    observers: &mut HashMap<ObserverId, mpsc::Sender<BroadcastEvent>>,
    event: &BroadcastEvent,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    observers.retain(|id, sink| match sink.try_send(event.clone()) {
        Ok(()) => {
            report.delivered += 1;
            true
        }
        Err(e) => {
            warn!(%id, "Dropping observer after failed delivery: {}", e);
            report.dropped.push(*id);
            false
        }
    });

    if !report.dropped.is_empty() {
        metrics::counter!("broadcast_observers_dropped_total")
            .increment(report.dropped.len() as u64);
        metrics::gauge!("broadcast_observers").set(observers.len() as f64);
    }
    debug!(kind = ?event.kind, delivered = report.delivered, "Broadcast complete");
    report
}
