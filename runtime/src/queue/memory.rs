//! In-memory task queue for tests and local runs.
//!
//! Same semantics as the Redis queue, without durability across process
//! restarts. Due times use [`tokio::time::Instant`], so tests with paused
//! time control when retries come due.

use super::{Lease, TaskQueue};
use crate::error::QueueError;
use crate::task::TaskEnvelope;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Lists {
    // Newest at the front, oldest at the back.
    pending: VecDeque<String>,
    processing: Vec<String>,
    scheduled: Vec<(Instant, String)>,
    dead: Vec<String>,
}

impl Lists {
    fn promote_due(&mut self, now: Instant) -> usize {
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.scheduled = waiting;

        due.sort_by_key(|(at, _)| *at);
        let promoted = due.len();
        for (_, raw) in due {
            self.pending.push_front(raw);
        }
        promoted
    }
}

/// In-memory task queue. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskQueue {
    queues: Arc<Mutex<HashMap<String, Lists>>>,
}

impl InMemoryTaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Lists>>, QueueError> {
        self.queues
            .lock()
            .map_err(|_| QueueError::Command("Mutex lock failed".to_string()))
    }

    /// Number of pending tasks in `queue`.
    #[must_use]
    pub fn pending_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|queues| queues.get(queue).map_or(0, |lists| lists.pending.len()))
            .unwrap_or(0)
    }

    /// Number of leased, unsettled tasks in `queue`.
    #[must_use]
    pub fn processing_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|queues| queues.get(queue).map_or(0, |lists| lists.processing.len()))
            .unwrap_or(0)
    }

    /// Number of retried tasks waiting for their due time in `queue`.
    #[must_use]
    pub fn scheduled_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|queues| queues.get(queue).map_or(0, |lists| lists.scheduled.len()))
            .unwrap_or(0)
    }

    /// Scheduled envelopes in `queue`, soonest due first.
    #[must_use]
    pub fn scheduled(&self, queue: &str) -> Vec<TaskEnvelope> {
        self.lock()
            .map(|queues| {
                queues
                    .get(queue)
                    .map(|lists| {
                        let mut entries: Vec<_> = lists.scheduled.iter().collect();
                        entries.sort_by_key(|(at, _)| *at);
                        decode_all(entries.into_iter().map(|(_, raw)| raw))
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Pending envelopes in `queue`, oldest first.
    #[must_use]
    pub fn pending(&self, queue: &str) -> Vec<TaskEnvelope> {
        self.lock()
            .map(|queues| {
                queues
                    .get(queue)
                    .map(|lists| decode_all(lists.pending.iter().rev()))
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Dead-lettered envelopes in `queue`, oldest first.
    #[must_use]
    pub fn dead_letters(&self, queue: &str) -> Vec<TaskEnvelope> {
        self.lock()
            .map(|queues| {
                queues
                    .get(queue)
                    .map(|lists| decode_all(lists.dead.iter()))
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Put raw bytes on the pending list, bypassing encoding.
    pub fn push_raw(&self, queue: &str, raw: &str) {
        if let Ok(mut queues) = self.lock() {
            queues
                .entry(queue.to_string())
                .or_default()
                .pending
                .push_front(raw.to_string());
        }
    }
}

fn decode_all<'a>(raw: impl Iterator<Item = &'a String>) -> Vec<TaskEnvelope> {
    raw.filter_map(|raw| serde_json::from_str(raw).ok()).collect()
}

fn remove_one(list: &mut Vec<String>, raw: &str) -> bool {
    list.iter()
        .position(|entry| entry == raw)
        .map(|index| list.remove(index))
        .is_some()
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), QueueError> {
        let raw = envelope.to_json()?;
        self.lock()?
            .entry(queue.to_string())
            .or_default()
            .pending
            .push_front(raw);
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Lease>, QueueError> {
        let mut queues = self.lock()?;
        let lists = queues.entry(queue.to_string()).or_default();
        lists.promote_due(Instant::now());

        while let Some(raw) = lists.pending.pop_back() {
            match serde_json::from_str::<TaskEnvelope>(&raw) {
                Ok(envelope) => {
                    lists.processing.push(raw.clone());
                    return Ok(Some(Lease {
                        queue: queue.to_string(),
                        envelope,
                        raw,
                    }));
                }
                Err(e) => {
                    tracing::error!(queue, error = %e, "Undecodable task envelope, dead-lettering");
                    lists.dead.push(raw);
                }
            }
        }
        Ok(None)
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        let mut queues = self.lock()?;
        if let Some(lists) = queues.get_mut(&lease.queue) {
            remove_one(&mut lists.processing, &lease.raw);
        }
        Ok(())
    }

    async fn retry(&self, lease: &Lease, error: &str, delay: Duration) -> Result<(), QueueError> {
        let next = lease.envelope.next_attempt(error).to_json()?;
        let due = Instant::now() + delay;
        let mut queues = self.lock()?;
        let lists = queues.entry(lease.queue.clone()).or_default();

        remove_one(&mut lists.processing, &lease.raw);
        lists.scheduled.push((due, next));
        Ok(())
    }

    async fn promote_due(&self, queue: &str) -> Result<usize, QueueError> {
        let mut queues = self.lock()?;
        Ok(queues
            .get_mut(queue)
            .map_or(0, |lists| lists.promote_due(Instant::now())))
    }

    async fn dead_letter(&self, lease: &Lease, error: &str) -> Result<(), QueueError> {
        let mut dead = lease.envelope.clone();
        dead.last_error = Some(error.to_string());
        let dead = dead.to_json()?;

        let mut queues = self.lock()?;
        let lists = queues.entry(lease.queue.clone()).or_default();
        remove_one(&mut lists.processing, &lease.raw);
        lists.dead.push(dead);
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize, QueueError> {
        let mut queues = self.lock()?;
        let lists = queues.entry(queue.to_string()).or_default();

        let recovered = lists.processing.len();
        // Oldest lease first; recovered tasks queue up behind pending ones.
        for raw in lists.processing.drain(..) {
            lists.pending.push_front(raw);
        }
        Ok(recovered)
    }
}
