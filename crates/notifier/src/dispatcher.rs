//! Fan-out queue and worker pool

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use storage::Alert;

use crate::fanout::FanOut;
use crate::NotifyError;

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Alerts waiting for fan-out before `enqueue` applies backpressure
    pub queue_capacity: usize,
    /// Concurrent fan-out workers
    pub workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            workers: 2,
        }
    }
}

/// Producer side of the fan-out queue
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Alert>,
}

/// Running fan-out workers. They exit once every dispatcher handle is dropped
/// and the queue drains.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Start the worker pool
    pub fn spawn(config: DispatcherConfig, fanout: Arc<FanOut>) -> (Self, WorkerPool) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = config.workers.max(1);

        let handles = (0..workers)
            .map(|worker| tokio::spawn(run_worker(worker, rx.clone(), fanout.clone())))
            .collect();

        info!(
            "Notification dispatcher started: queue={}, workers={}",
            config.queue_capacity, workers
        );
        (Self { tx }, WorkerPool { handles })
    }

    /// Queue an alert for fan-out. Waits only for queue space, never for
    /// the fan-out itself.
    pub async fn enqueue(&self, alert: Alert) -> Result<(), NotifyError> {
        self.tx.send(alert).await.map_err(|_| NotifyError::QueueClosed)
    }
}

impl WorkerPool {
    /// Wait for every worker to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Fan-out worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_worker(worker: usize, rx: Arc<Mutex<mpsc::Receiver<Alert>>>, fanout: Arc<FanOut>) {
    debug!(worker, "Fan-out worker started");

    loop {
        // Hold the lock only while waiting for the next alert
        let next = rx.lock().await.recv().await;
        let Some(alert) = next else {
            break;
        };

        if let Err(e) = fanout.fan_out(&alert).await {
            error!(worker, alert_id = alert.id, "Fan-out failed: {}", e);
        }
    }

    debug!(worker, "Fan-out worker stopped");
}
