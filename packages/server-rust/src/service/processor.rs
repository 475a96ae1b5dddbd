//! Background queue processor.
//!
//! Runs a receive loop on a spawned tokio task and dispatches each delivery
//! to a [`DeliveryHandler`] on its own task, with the number of in-flight
//! handlers bounded by a semaphore. On stop the loop stops receiving, waits
//! up to the grace period for in-flight handlers, then aborts the remainder
//! and abandons their leases so the messages are redelivered promptly.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::queue::{LeaseId, QueueError};
use crate::service::consumer::DeliveryHandler;
use crate::traits::QueueTransport;

/// Pause after a transport error before receiving again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// Processor loop settings.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum number of handlers running at once.
    pub max_concurrent_handlers: usize,
    /// Upper bound on one receive call.
    pub receive_wait: Duration,
    /// How long `stop` waits for in-flight handlers.
    pub shutdown_grace: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: 16,
            receive_wait: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Handle to a running processor loop.
pub struct QueueProcessor {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    in_flight: Arc<DashMap<LeaseId, ()>>,
}

impl QueueProcessor {
    /// Spawns the processor loop. Must be called within a tokio runtime.
    pub fn start<H: DeliveryHandler>(
        queue: Arc<dyn QueueTransport>,
        handler: Arc<H>,
        config: ProcessorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let in_flight = Arc::new(DashMap::new());

        let handle = tokio::spawn(run_loop(
            queue,
            handler,
            config,
            shutdown_rx,
            Arc::clone(&in_flight),
        ));

        Self {
            shutdown_tx,
            handle: Some(handle),
            in_flight,
        }
    }

    /// Number of deliveries currently being handled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether the loop task has exited (stopped, or the queue closed).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops receiving and drains in-flight handlers.
    ///
    /// Returns once the loop task has exited. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Queue processor task failed");
            }
        }
    }
}

async fn run_loop<H: DeliveryHandler>(
    queue: Arc<dyn QueueTransport>,
    handler: Arc<H>,
    config: ProcessorConfig,
    mut shutdown_rx: watch::Receiver<bool>,
    in_flight: Arc<DashMap<LeaseId, ()>>,
) {
    let permits = Arc::new(Semaphore::new(config.max_concurrent_handlers.max(1)));
    let mut tasks = JoinSet::new();

    info!(
        max_concurrent_handlers = config.max_concurrent_handlers,
        "Queue processor started"
    );

    loop {
        // Reap finished handlers so the set does not grow unbounded.
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Message handler task failed");
            }
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let received = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            received = queue.receive(config.receive_wait) => received,
        };

        let delivery = match received {
            Ok(Some(delivery)) => delivery,
            Ok(None) => continue,
            Err(QueueError::Closed) => {
                info!("Queue closed, processor loop exiting");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Receive failed, backing off");
                drop(permit);
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                continue;
            }
        };

        let lease = delivery.lease;
        in_flight.insert(lease, ());
        let queue = Arc::clone(&queue);
        let handler = Arc::clone(&handler);
        let in_flight = Arc::clone(&in_flight);
        tasks.spawn(async move {
            let _permit = permit;
            handler.handle(queue.as_ref(), delivery).await;
            in_flight.remove(&lease);
        });
    }

    drain(&mut tasks, queue.as_ref(), &in_flight, config.shutdown_grace).await;
    info!("Queue processor stopped");
}

/// Waits for in-flight handlers, then aborts stragglers and abandons their
/// leases.
async fn drain(
    tasks: &mut JoinSet<()>,
    queue: &dyn QueueTransport,
    in_flight: &DashMap<LeaseId, ()>,
    grace: Duration,
) {
    if tasks.is_empty() {
        return;
    }
    debug!(pending = tasks.len(), "Draining in-flight handlers");

    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Message handler task failed");
            }
        }
    })
    .await;

    if drained.is_ok() {
        return;
    }

    warn!(
        pending = tasks.len(),
        "Shutdown grace period elapsed, aborting in-flight handlers"
    );
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}

    let leases: Vec<LeaseId> = in_flight.iter().map(|entry| *entry.key()).collect();
    for lease in leases {
        in_flight.remove(&lease);
        if let Err(e) = queue.abandon(lease).await {
            debug!(lease = %lease, error = %e, "Could not abandon lease");
        }
    }
}
