//! In-memory [`QueueTransport`] with lease/visibility semantics.
//!
//! Suitable for development and tests. Delivery is at-least-once: a leased
//! message that is neither completed nor abandoned before its visibility
//! timeout is handed out again. Messages that exceed `max_delivery_count`
//! are moved to a dead-letter list instead of being redelivered.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::envelope::{Delivery, Envelope, LeaseId};
use super::QueueError;
use crate::traits::QueueTransport;

/// Configuration for [`InMemoryQueue`].
#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// Name used in logs.
    pub name: String,
    /// How long a delivery stays invisible to other receivers.
    pub visibility_timeout: Duration,
    /// Deliveries after which an unacknowledged message is dead-lettered.
    pub max_delivery_count: u32,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self {
            name: "message".to_string(),
            visibility_timeout: Duration::from_secs(30),
            max_delivery_count: 10,
        }
    }
}

/// A message removed from circulation after too many delivery attempts.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message_id: Uuid,
    pub delivery_count: u32,
    pub envelope: Envelope,
    pub reason: &'static str,
}

#[derive(Debug)]
struct StoredMessage {
    id: Uuid,
    envelope: Envelope,
    delivery_count: u32,
}

#[derive(Debug)]
struct Lease {
    message: StoredMessage,
    expires_at: Instant,
}

/// In-memory queue shared by producers and consumers via `Arc`.
///
/// All operations are safe for concurrent use; no lock is held across an
/// await point.
#[derive(Debug)]
pub struct InMemoryQueue {
    config: InMemoryQueueConfig,
    ready: Mutex<VecDeque<StoredMessage>>,
    leased: DashMap<LeaseId, Lease>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new(config: InMemoryQueueConfig) -> Self {
        Self {
            config,
            ready: Mutex::new(VecDeque::new()),
            leased: DashMap::new(),
            dead_letters: Mutex::new(Vec::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of messages waiting to be delivered.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.ready.lock().len()
    }

    /// Number of messages currently leased to a receiver.
    #[must_use]
    pub fn leased_count(&self) -> usize {
        self.leased.len()
    }

    /// Snapshot of dead-lettered messages.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    /// Stops accepting publishes. Receivers drain what is left, then see
    /// [`QueueError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns expired leases to the ready queue (or the dead-letter list).
    fn reclaim_expired(&self, now: Instant) {
        let expired: Vec<LeaseId> = self
            .leased
            .iter()
            .filter(|entry| entry.value().expires_at <= now)
            .map(|entry| *entry.key())
            .collect();

        for lease_id in expired {
            if let Some((_, lease)) = self.leased.remove(&lease_id) {
                debug!(
                    queue = %self.config.name,
                    message_id = %lease.message.id,
                    "Lease {} expired, message becomes visible again",
                    lease_id
                );
                self.requeue(lease.message, "lease expired");
            }
        }
    }

    fn requeue(&self, message: StoredMessage, cause: &'static str) {
        if message.delivery_count >= self.config.max_delivery_count {
            warn!(
                queue = %self.config.name,
                message_id = %message.id,
                delivery_count = message.delivery_count,
                cause,
                "Max delivery count reached, moving message to dead-letter list"
            );
            self.dead_letters.lock().push(DeadLetter {
                message_id: message.id,
                delivery_count: message.delivery_count,
                envelope: message.envelope,
                reason: "max delivery count exceeded",
            });
            return;
        }
        self.ready.lock().push_back(message);
        self.notify.notify_one();
    }

    fn try_lease(&self, now: Instant) -> Option<Delivery> {
        let mut message = self.ready.lock().pop_front()?;
        message.delivery_count += 1;

        let lease = LeaseId::new();
        let delivery = Delivery {
            message_id: message.id,
            lease,
            delivery_count: message.delivery_count,
            envelope: message.envelope.clone(),
        };
        self.leased.insert(
            lease,
            Lease {
                message,
                expires_at: now + self.config.visibility_timeout,
            },
        );
        Some(delivery)
    }

    fn next_lease_expiry(&self) -> Option<Instant> {
        self.leased.iter().map(|entry| entry.value().expires_at).min()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(InMemoryQueueConfig::default())
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    async fn publish(&self, envelope: Envelope) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        let id = Uuid::new_v4();
        debug!(queue = %self.config.name, message_id = %id, "Message enqueued");
        self.ready.lock().push_back(StoredMessage {
            id,
            envelope,
            delivery_count: 0,
        });
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + max_wait;

        loop {
            // Register interest before checking, so a publish between the
            // check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            self.reclaim_expired(now);
            if let Some(delivery) = self.try_lease(now) {
                return Ok(Some(delivery));
            }
            if self.is_closed() {
                return Err(QueueError::Closed);
            }
            if now >= deadline {
                return Ok(None);
            }

            let wake_at = self
                .next_lease_expiry()
                .map_or(deadline, |expiry| expiry.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn complete(&self, lease: LeaseId) -> Result<(), QueueError> {
        match self.leased.remove(&lease) {
            Some((_, held)) => {
                debug!(
                    queue = %self.config.name,
                    message_id = %held.message.id,
                    "Message completed"
                );
                Ok(())
            }
            None => Err(QueueError::UnknownLease(lease)),
        }
    }

    async fn abandon(&self, lease: LeaseId) -> Result<(), QueueError> {
        match self.leased.remove(&lease) {
            Some((_, held)) => {
                self.requeue(held.message, "abandoned");
                Ok(())
            }
            None => Err(QueueError::UnknownLease(lease)),
        }
    }
}
