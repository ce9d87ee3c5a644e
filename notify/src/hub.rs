//! Notification hub: the per-account connection registry.
//!
//! # Architecture
//!
//! ```text
//!              ┌───────────────────────────────┐
//! subscribe ──>│ Mutex<HashMap<AccountId, Conn>>│<── unsubscribe
//!              └──────────────┬────────────────┘
//!                             │ snapshot (lock released)
//!             ┌───────────────┼───────────────┐
//!             ▼               ▼               ▼
//!          send(1)         send(2)   ...   send(n)     each bounded by the
//!             │               │               │        write timeout
//!             └───────────────┴──── tally (AtomicUsize)
//! ```
//!
//! The lock is held only to read or mutate the map. Writes and closes
//! happen outside it and share the write timeout, so one slow connection
//! never blocks registration or delivery to others.

use crate::connection::Connection;
use crate::error::{ConnectionError, NotifyError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use ticket_core::AccountId;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Deadline for a single write to, or close of, a single connection.
    ///
    /// Default: 10 seconds
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl HubConfig {
    /// Set the per-write and per-close deadline.
    #[must_use]
    pub const fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

type Registry = HashMap<AccountId, Arc<dyn Connection>>;

/// Registry of live connections, at most one per account.
///
/// Share it as `Arc<Hub>`; every method takes `&self`.
pub struct Hub {
    connections: Mutex<Registry>,
    config: HubConfig,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Create an empty hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create an empty hub.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            config,
        }
    }

    // A poisoned map is still structurally valid: every critical section is
    // a single insert/remove/get.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` for the account.
    ///
    /// A previous connection for the same account is replaced and closed.
    pub async fn subscribe(&self, account_id: AccountId, connection: Arc<dyn Connection>) {
        let new_id = connection.id();
        let previous = self.registry().insert(account_id, connection);

        match previous {
            Some(old) if old.id() != new_id => {
                info!(%account_id, old = %old.id(), new = %new_id, "Replacing existing connection");
                self.close_with_timeout(account_id, old.as_ref()).await;
            }
            Some(_) => debug!(%account_id, connection = %new_id, "Connection re-registered"),
            None => info!(%account_id, connection = %new_id, "Connection registered"),
        }
    }

    /// Remove the account's registration and close `connection`.
    ///
    /// The entry is only removed if it still refers to this connection, so
    /// a late unsubscribe from a replaced socket cannot evict its successor.
    /// The passed connection is closed either way.
    pub async fn unsubscribe(&self, account_id: AccountId, connection: &Arc<dyn Connection>) {
        let removed = {
            let mut registry = self.registry();
            let current = registry.get(&account_id).map(|c| c.id());
            if current == Some(connection.id()) {
                registry.remove(&account_id)
            } else {
                None
            }
        };

        if removed.is_some() {
            info!(%account_id, connection = %connection.id(), "Connection unregistered");
        } else {
            debug!(%account_id, connection = %connection.id(), "Unsubscribe for a connection that is not registered");
        }

        self.close_with_timeout(account_id, connection.as_ref()).await;
    }

    async fn close_with_timeout(&self, account_id: AccountId, connection: &dyn Connection) {
        if tokio::time::timeout(self.config.write_timeout, connection.close())
            .await
            .is_err()
        {
            warn!(%account_id, connection = %connection.id(), "Close timed out, abandoning connection");
        }
    }

    /// Send a JSON message to one account.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::RecipientNotRegistered`]: account is offline
    /// - [`NotifyError::Delivery`]: the write failed or timed out
    /// - [`NotifyError::Serialization`]: `message` is not JSON-encodable
    pub async fn publish<T>(&self, account_id: AccountId, message: &T) -> Result<(), NotifyError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(message)?;
        self.publish_text(account_id, &text).await
    }

    /// Send an already-encoded message to one account.
    ///
    /// # Errors
    ///
    /// See [`publish`](Self::publish).
    pub async fn publish_text(&self, account_id: AccountId, text: &str) -> Result<(), NotifyError> {
        let connection = self
            .registry()
            .get(&account_id)
            .cloned()
            .ok_or(NotifyError::RecipientNotRegistered(account_id))?;

        send_with_timeout(connection.as_ref(), text, self.config.write_timeout)
            .await
            .map_err(|source| {
                warn!(%account_id, error = %source, "Publish failed");
                NotifyError::Delivery { account_id, source }
            })
    }

    /// Send a JSON message to every registered account concurrently.
    ///
    /// Returns the number of connections that accepted the message. Failed
    /// or timed-out writes are logged and do not affect other recipients.
    ///
    /// # Errors
    ///
    /// [`NotifyError::Serialization`] if `message` is not JSON-encodable;
    /// nothing is sent in that case.
    pub async fn broadcast<T>(&self, message: &T) -> Result<usize, NotifyError>
    where
        T: Serialize + ?Sized,
    {
        let text: Arc<str> = serde_json::to_string(message)?.into();
        let recipients: Vec<(AccountId, Arc<dyn Connection>)> = self
            .registry()
            .iter()
            .map(|(id, conn)| (*id, Arc::clone(conn)))
            .collect();

        let total = recipients.len();
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut sends = JoinSet::new();

        for (account_id, connection) in recipients {
            let text = Arc::clone(&text);
            let delivered = Arc::clone(&delivered);
            let write_timeout = self.config.write_timeout;

            sends.spawn(async move {
                match send_with_timeout(connection.as_ref(), &text, write_timeout).await {
                    Ok(()) => {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => warn!(%account_id, error = %e, "Broadcast delivery failed"),
                }
            });
        }

        while let Some(joined) = sends.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Broadcast send task failed");
            }
        }

        let delivered = delivered.load(Ordering::Relaxed);
        metrics::counter!("hub_broadcast_deliveries_total").increment(delivered as u64);
        debug!(delivered, total, "Broadcast complete");
        Ok(delivered)
    }

    /// Whether the account has a registered connection.
    #[must_use]
    pub fn is_online(&self, account_id: AccountId) -> bool {
        self.registry().contains_key(&account_id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    /// Whether no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    /// The hub's configuration.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

async fn send_with_timeout(
    connection: &dyn Connection,
    text: &str,
    write_timeout: Duration,
) -> Result<(), ConnectionError> {
    tokio::time::timeout(write_timeout, connection.send(text))
        .await
        .map_err(|_| ConnectionError::Timeout)?
}
