//! Worker loops that drain a [`TaskQueue`].
//!
//! Each worker repeatedly leases one task, decodes it, runs the handler and
//! settles the lease:
//!
//! | outcome | settlement |
//! |---------|------------|
//! | handler succeeded | `ack` |
//! | unknown kind / bad payload | `dead_letter` |
//! | permanent handler error | `dead_letter` |
//! | transient error, budget left | `retry` with a backoff delay |
//! | transient error, budget spent | `dead_letter` |
//!
//! A retried task waits out its backoff in the queue's scheduled set, not
//! in the worker, so one failing task never holds up the rest of the queue.

use crate::error::QueueError;
use crate::handlers::TaskHandler;
use crate::queue::{Lease, TaskQueue};
use crate::retry::Backoff;
use crate::task::DEFAULT_QUEUE;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Processor settings.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Queue to drain.
    ///
    /// Default: `default`
    pub queue: String,

    /// Number of concurrent workers.
    ///
    /// Default: 2
    pub concurrency: usize,

    /// How long an idle worker waits before polling again.
    ///
    /// Default: 1 second
    pub poll_interval: Duration,

    /// Delay before a failed task is due again. The attempt budget comes
    /// from each task's `max_retry`.
    ///
    /// Default: 1s initial, doubling, capped at 5 minutes
    pub backoff: Backoff,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            concurrency: 2,
            poll_interval: Duration::from_secs(1),
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(300)),
        }
    }
}

impl ProcessorConfig {
    /// Set the queue to drain.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the worker count (at least one worker always runs).
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the idle poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the retry backoff.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Drains one queue with a pool of workers.
pub struct TaskProcessor {
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    config: ProcessorConfig,
}

impl TaskProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn TaskHandler>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process at most one task.
    ///
    /// Returns `false` if the queue was empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue backend fails. Handler failures
    /// are settled on the queue, not returned.
    pub async fn process_next(&self) -> Result<bool, QueueError> {
        let Some(lease) = self.queue.dequeue(&self.config.queue).await? else {
            return Ok(false);
        };
        self.process(&lease).await?;
        Ok(true)
    }

    /// Recover leftover leases, then run workers until `shutdown` turns
    /// `true` or its sender is dropped.
    ///
    /// Workers finish the task in hand before stopping. Scheduled retries
    /// stay in the queue for the next run.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if startup recovery fails.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        let recovered = self.queue.recover(&self.config.queue).await?;
        let workers = self.config.concurrency.max(1);
        info!(
            queue = %self.config.queue,
            workers,
            recovered,
            "Task processor started"
        );

        let this = Arc::new(self);
        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            let this = Arc::clone(&this);
            let shutdown = shutdown.clone();
            tasks.spawn(async move { this.work(worker, shutdown).await });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Task worker panicked");
            }
        }

        info!(queue = %this.config.queue, "Task processor stopped");
        Ok(())
    }

    async fn work(&self, worker: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => error!(worker, error = %e, "Task queue error"),
            }

            tokio::select! {
                () = sleep(self.config.poll_interval) => {}
                () = shutdown_requested(&mut shutdown) => break,
            }
        }
        debug!(worker, "Task worker stopped");
    }

    async fn process(&self, lease: &Lease) -> Result<(), QueueError> {
        let task = match lease.envelope.decode() {
            Ok(task) => task,
            Err(e) => {
                warn!(
                    task_id = %lease.envelope.id,
                    kind = %lease.envelope.kind,
                    error = %e,
                    "Undecodable task, dead-lettering"
                );
                return self.fail(lease, &e.to_string()).await;
            }
        };

        match self.handler.handle(task).await {
            Ok(()) => {
                self.queue.ack(lease).await?;
                metrics::counter!("tasks_processed_total", "kind" => lease.envelope.kind.clone())
                    .increment(1);
                info!(
                    task_id = %lease.envelope.id,
                    kind = %lease.envelope.kind,
                    "Task processed successfully"
                );
            }
            Err(e) if e.is_permanent() || !lease.envelope.can_retry() => {
                error!(
                    task_id = %lease.envelope.id,
                    kind = %lease.envelope.kind,
                    retried = lease.envelope.retried,
                    permanent = e.is_permanent(),
                    error = %e,
                    "Task failed, dead-lettering"
                );
                self.fail(lease, &e.to_string()).await?;
            }
            Err(e) => {
                let delay = self.config.backoff.jittered(lease.envelope.retried);
                warn!(
                    task_id = %lease.envelope.id,
                    kind = %lease.envelope.kind,
                    retried = lease.envelope.retried,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Task failed, retry scheduled"
                );
                self.queue.retry(lease, &e.to_string(), delay).await?;
            }
        }

        Ok(())
    }

    async fn fail(&self, lease: &Lease, error: &str) -> Result<(), QueueError> {
        self.queue.dead_letter(lease, error).await?;
        metrics::counter!("tasks_failed_total", "kind" => lease.envelope.kind.clone()).increment(1);
        Ok(())
    }
}

impl std::fmt::Debug for TaskProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
