//! # Ticket Runtime
//!
//! Background task processing for the ticket platform.
//!
//! Producers enqueue typed [`Task`]s on a [`TaskQueue`]; a
//! [`TaskProcessor`] drains the queue with a small worker pool, hands each
//! task to a [`TaskHandler`] and settles it: acknowledged on success,
//! scheduled for a later retry with exponential backoff on transient failure,
//! dead-lettered when the failure is permanent or the retry budget is spent.
//!
//! ## Core Components
//!
//! - **Tasks**: [`Task`], [`TaskEnvelope`], [`EnqueueOptions`]
//! - **Queues**: [`RedisTaskQueue`] (durable), [`InMemoryTaskQueue`]
//! - **Processing**: [`TaskProcessor`], [`AppTaskHandler`], [`Backoff`]
//! - **Mail**: [`Mailer`], [`SmtpMailer`]
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_core::AccountId;
//! use ticket_notify::Hub;
//! use ticket_runtime::mocks::MockMailer;
//! use ticket_runtime::{
//!     AppTaskHandler, EnqueueOptions, InMemoryTaskQueue, NotificationPayload, ProcessorConfig,
//!     Task, TaskProcessor, TaskQueue,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ticket_runtime::QueueError> {
//! let queue = Arc::new(InMemoryTaskQueue::new());
//! let handler = AppTaskHandler::new(Arc::new(MockMailer::new()), Arc::new(Hub::new()));
//!
//! queue
//!     .enqueue(
//!         &Task::SendNotification(NotificationPayload {
//!             receiver_id: AccountId::new(42),
//!             title: "Order shipped".into(),
//!             content: "Your tickets are on the way".into(),
//!         }),
//!         EnqueueOptions::default(),
//!     )
//!     .await?;
//!
//! let processor = TaskProcessor::new(queue.clone(), Arc::new(handler), ProcessorConfig::default());
//! assert!(processor.process_next().await?);
//! assert_eq!(queue.pending_len("default"), 0);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod handlers;
pub mod mail;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod task;

/// Mock mailer and handler.
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use error::{MailError, QueueError, TaskError};
pub use handlers::{AppTaskHandler, TaskHandler};
pub use mail::{EmailMessage, Mailer, SmtpConfig, SmtpMailer};
pub use processor::{ProcessorConfig, TaskProcessor};
pub use queue::{InMemoryTaskQueue, Lease, RedisTaskQueue, TaskQueue};
pub use retry::Backoff;
pub use task::{
    EnqueueOptions, NotificationPayload, Task, TaskEnvelope, TaskKind, VerifyEmailPayload,
};
