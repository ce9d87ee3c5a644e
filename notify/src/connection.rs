//! The realtime connection seam.
//!
//! The hub never sees sockets. Anything that can write a text frame and be
//! closed can be registered: the web layer adapts axum WebSockets, tests use
//! [`MockConnection`](crate::mocks::MockConnection).

use crate::error::ConnectionError;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Identity of one connection instance.
///
/// Distinguishes a replaced connection from its successor under the same
/// account ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live bidirectional message channel owned by one account.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Write one text message.
    ///
    /// Implementations serialize concurrent writers themselves.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Closed`] after [`close`](Self::close), otherwise
    /// whatever the transport reports.
    async fn send(&self, text: &str) -> Result<(), ConnectionError>;

    /// Close the channel. Idempotent.
    async fn close(&self);
}
