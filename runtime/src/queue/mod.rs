//! Task queue abstraction.
//!
//! A task moves through four stages per queue:
//!
//! ```text
//! enqueue ──> pending ──dequeue──> processing ──ack──> (gone)
//!                ▲                     │
//!             promote                  ├──retry──> scheduled
//!                │                     │               │
//!                └─────── (due) ───────┼───────────────┘
//!                                      └──dead_letter──> dead
//! ```
//!
//! A task stays in `processing` until it is acknowledged, retried or
//! dead-lettered. A retried task leaves `processing` at once and waits in
//! `scheduled` until its due time, so no worker is tied up by a backoff.
//! After a crash, [`TaskQueue::recover`] moves everything in `processing`
//! back to `pending`, so delivery is at-least-once.

use crate::error::QueueError;
use crate::task::{EnqueueOptions, Task, TaskEnvelope};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod redis;

pub use memory::InMemoryTaskQueue;
pub use redis::RedisTaskQueue;

/// A dequeued task, held until it is settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    /// Queue the task came from.
    pub queue: String,
    /// Decoded envelope.
    pub envelope: TaskEnvelope,
    /// The exact stored bytes, used to remove the entry from `processing`.
    pub raw: String,
}

/// Durable task queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append an envelope to `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend rejects the write.
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), QueueError>;

    /// Promote due scheduled tasks, then take the oldest pending task, if
    /// any, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn dequeue(&self, queue: &str) -> Result<Option<Lease>, QueueError>;

    /// Mark a leased task as done.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn ack(&self, lease: &Lease) -> Result<(), QueueError>;

    /// Atomically move a leased task to `scheduled` with `retried + 1`,
    /// due after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn retry(&self, lease: &Lease, error: &str, delay: Duration) -> Result<(), QueueError>;

    /// Move scheduled tasks whose due time has passed to pending.
    ///
    /// Returns the number of promoted tasks. [`dequeue`](Self::dequeue)
    /// calls this itself.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn promote_due(&self, queue: &str) -> Result<usize, QueueError>;

    /// Move a leased task to the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn dead_letter(&self, lease: &Lease, error: &str) -> Result<(), QueueError>;

    /// Move every task left in `processing` back to pending. Scheduled
    /// tasks are left alone.
    ///
    /// Returns the number of recovered tasks. Call once before starting
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails.
    async fn recover(&self, queue: &str) -> Result<usize, QueueError>;

    /// Enqueue a typed task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if encoding or the write fails.
    async fn enqueue(&self, task: &Task, options: EnqueueOptions) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope::new(task, options.max_retry)?;
        self.push(&options.queue, &envelope).await?;

        tracing::info!(
            task_id = %envelope.id,
            kind = %envelope.kind,
            queue = %options.queue,
            max_retry = options.max_retry,
            "Task enqueued"
        );
        Ok(envelope.id)
    }

    /// Enqueue an arbitrary kind and payload.
    ///
    /// The kind is not validated here; unknown kinds are dead-lettered by
    /// the processor.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the write fails.
    async fn enqueue_raw(
        &self,
        kind: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope::from_parts(kind, payload, options.max_retry);
        self.push(&options.queue, &envelope).await?;
        Ok(envelope.id)
    }
}

/// Redis key of the pending list.
#[must_use]
pub fn pending_key(queue: &str) -> String {
    format!("tasks:{queue}")
}

/// Redis key of the processing list.
#[must_use]
pub fn processing_key(queue: &str) -> String {
    format!("tasks:{queue}:processing")
}

/// Redis key of the scheduled sorted set, scored by due time in epoch
/// milliseconds.
#[must_use]
pub fn scheduled_key(queue: &str) -> String {
    format!("tasks:{queue}:scheduled")
}

/// Redis key of the dead-letter list.
#[must_use]
pub fn dead_key(queue: &str) -> String {
    format!("tasks:{queue}:dead")
}
