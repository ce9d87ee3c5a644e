//! # Ticket Notify
//!
//! Realtime notification delivery for the ticket platform.
//!
//! The [`Hub`] keeps at most one live [`Connection`] per account and pushes
//! JSON messages to one account ([`Hub::publish`]) or to everyone
//! ([`Hub::broadcast`]). It does not impose an envelope on messages.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_core::AccountId;
//! use ticket_notify::mocks::MockConnection;
//! use ticket_notify::{Connection, Hub};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ticket_notify::NotifyError> {
//! let hub = Hub::new();
//! let conn: Arc<dyn Connection> = Arc::new(MockConnection::new());
//!
//! hub.subscribe(AccountId::new(1), Arc::clone(&conn)).await;
//! assert!(hub.is_online(AccountId::new(1)));
//!
//! let delivered = hub.broadcast(&serde_json::json!({"msg": "hi everyone"})).await?;
//! assert_eq!(delivered, 1);
//!
//! hub.unsubscribe(AccountId::new(1), &conn).await;
//! assert!(hub.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod connection;
pub mod error;
pub mod hub;

/// In-memory connection implementation.
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use connection::{Connection, ConnectionId};
pub use error::{ConnectionError, NotifyError};
pub use hub::{Hub, HubConfig};
