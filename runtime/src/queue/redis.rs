//! Redis-backed task queue.
//!
//! # Architecture
//!
//! Four keys per queue name:
//! - **Pending**: `tasks:{queue}` (`LPUSH` in, `RPOPLPUSH` out, so FIFO)
//! - **Processing**: `tasks:{queue}:processing` (leased, unsettled)
//! - **Scheduled**: `tasks:{queue}:scheduled` (sorted set of retries, scored
//!   by due time in epoch milliseconds)
//! - **Dead**: `tasks:{queue}:dead` (exhausted or undecodable)
//!
//! Moves between keys are single commands, `MULTI` pipelines or a Lua
//! script, so a task is never in zero places and never promoted twice.
//!
//! # Example
//!
//! ```no_run
//! use ticket_runtime::queue::{RedisTaskQueue, TaskQueue};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = RedisTaskQueue::new("redis://127.0.0.1:6379").await?;
//! let recovered = queue.recover("default").await?;
//! # Ok(())
//! # }
//! ```

use super::{Lease, TaskQueue, dead_key, pending_key, processing_key, scheduled_key};
use crate::error::QueueError;
use crate::task::TaskEnvelope;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Upper bound on tasks promoted per call.
const PROMOTE_BATCH: usize = 100;

// KEYS[1] scheduled set, KEYS[2] pending list; ARGV[1] now (ms), ARGV[2] batch.
const PROMOTE_SCRIPT: &str = r"
    local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
    for _, raw in ipairs(due) do
        redis.call('ZREM', KEYS[1], raw)
        redis.call('LPUSH', KEYS[2], raw)
    end
    return #due
";

/// Redis-backed task queue.
#[derive(Clone)]
pub struct RedisTaskQueue {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisTaskQueue {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Connection`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = Client::open(redis_url)
            .map_err(|e| QueueError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            QueueError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// Move one entry from `processing` to `target`, replacing its bytes.
    async fn settle(&self, lease: &Lease, target: &str, replacement: &str) -> Result<(), QueueError> {
        let mut conn = self.conn_manager.clone();

        let _: () = redis::pipe()
            .atomic()
            .lrem(processing_key(&lease.queue), 1, &lease.raw)
            .ignore()
            .lpush(target, replacement)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("Failed to move task {}: {e}", lease.envelope.id)))?;

        Ok(())
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), QueueError> {
        let raw = envelope.to_json()?;
        let mut conn = self.conn_manager.clone();

        conn.lpush::<_, _, ()>(pending_key(queue), raw)
            .await
            .map_err(|e| QueueError::Command(format!("Failed to enqueue task: {e}")))
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Lease>, QueueError> {
        self.promote_due(queue).await?;
        let mut conn = self.conn_manager.clone();

        loop {
            let raw: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(pending_key(queue))
                .arg(processing_key(queue))
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Command(format!("Failed to dequeue task: {e}")))?;

            let Some(raw) = raw else {
                return Ok(None);
            };

            match serde_json::from_str::<TaskEnvelope>(&raw) {
                Ok(envelope) => {
                    return Ok(Some(Lease {
                        queue: queue.to_string(),
                        envelope,
                        raw,
                    }));
                }
                Err(e) => {
                    tracing::error!(queue, error = %e, "Undecodable task envelope, dead-lettering");
                    let _: () = redis::pipe()
                        .atomic()
                        .lrem(processing_key(queue), 1, &raw)
                        .ignore()
                        .lpush(dead_key(queue), &raw)
                        .ignore()
                        .query_async(&mut conn)
                        .await
                        .map_err(|e| QueueError::Command(format!("Failed to dead-letter task: {e}")))?;
                }
            }
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        let mut conn = self.conn_manager.clone();

        conn.lrem::<_, _, ()>(processing_key(&lease.queue), 1, &lease.raw)
            .await
            .map_err(|e| QueueError::Command(format!("Failed to ack task {}: {e}", lease.envelope.id)))
    }

    async fn retry(&self, lease: &Lease, error: &str, delay: Duration) -> Result<(), QueueError> {
        let next = lease.envelope.next_attempt(error).to_json()?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due_ms = Utc::now().timestamp_millis().saturating_add(delay_ms);
        let mut conn = self.conn_manager.clone();

        let _: () = redis::pipe()
            .atomic()
            .lrem(processing_key(&lease.queue), 1, &lease.raw)
            .ignore()
            .zadd(scheduled_key(&lease.queue), &next, due_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                QueueError::Command(format!("Failed to schedule task {}: {e}", lease.envelope.id))
            })?;

        Ok(())
    }

    async fn promote_due(&self, queue: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn_manager.clone();

        let promoted: usize = redis::Script::new(PROMOTE_SCRIPT)
            .key(scheduled_key(queue))
            .key(pending_key(queue))
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("Failed to promote scheduled tasks: {e}")))?;

        if promoted > 0 {
            tracing::debug!(queue, promoted, "Promoted due retries");
        }
        Ok(promoted)
    }

    async fn dead_letter(&self, lease: &Lease, error: &str) -> Result<(), QueueError> {
        let mut dead = lease.envelope.clone();
        dead.last_error = Some(error.to_string());
        self.settle(lease, &dead_key(&lease.queue), &dead.to_json()?).await
    }

    async fn recover(&self, queue: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn_manager.clone();
        let mut recovered = 0;

        // Oldest lease first; recovered tasks queue up behind pending ones.
        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(processing_key(queue))
                .arg(pending_key(queue))
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Command(format!("Failed to recover tasks: {e}")))?;

            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::warn!(queue, recovered, "Recovered unsettled tasks from a previous run");
        }
        Ok(recovered)
    }
}
