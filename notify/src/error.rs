//! Error types for the notification hub.

use thiserror::Error;
use ticket_core::AccountId;

/// Failure writing to a single connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection was already closed.
    #[error("Connection closed")]
    Closed,

    /// The write did not finish within the write timeout.
    #[error("Write timed out")]
    Timeout,

    /// The underlying transport failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Hub operation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No connection registered for the account.
    #[error("Recipient {0} is not registered")]
    RecipientNotRegistered(AccountId),

    /// The recipient's connection rejected the message.
    #[error("Delivery to {account_id} failed: {source}")]
    Delivery {
        /// Recipient
        account_id: AccountId,
        /// Underlying connection failure
        #[source]
        source: ConnectionError,
    },

    /// The message could not be encoded as JSON.
    #[error("Failed to serialize message: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
