//! Error types for the background task runtime.

use thiserror::Error;
use ticket_notify::NotifyError;

/// Task queue backend failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The backend could not be reached.
    #[error("Queue connection error: {0}")]
    Connection(String),

    /// A queue command failed.
    #[error("Queue command failed: {0}")]
    Command(String),

    /// A task could not be encoded.
    #[error("Failed to serialize task: {0}")]
    Serialization(String),
}

/// Outbound email failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    /// Sender or recipient address does not parse.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled.
    #[error("Failed to build email: {0}")]
    Build(String),

    /// The SMTP exchange failed.
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Task processing failures.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The envelope names a task kind nobody handles.
    #[error("Unknown task kind: {0}")]
    UnknownKind(String),

    /// The payload does not match the kind's schema.
    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload {
        /// Task kind
        kind: String,
        /// Decoder message
        reason: String,
    },

    /// Sending mail failed.
    #[error(transparent)]
    Mail(#[from] MailError),

    /// Realtime delivery failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl TaskError {
    /// Whether retrying can never succeed.
    ///
    /// Permanent failures are dead-lettered immediately.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnknownKind(_)
                | Self::InvalidPayload { .. }
                | Self::Mail(MailError::InvalidAddress(_) | MailError::Build(_))
                | Self::Notify(NotifyError::Serialization(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_core::AccountId;

    #[test]
    fn test_permanence() {
        assert!(TaskError::UnknownKind("x".into()).is_permanent());
        assert!(TaskError::Mail(MailError::InvalidAddress("nope".into())).is_permanent());
        assert!(!TaskError::Mail(MailError::Transport("timeout".into())).is_permanent());
        assert!(
            !TaskError::Notify(NotifyError::RecipientNotRegistered(AccountId::new(1))).is_permanent()
        );
    }
}
