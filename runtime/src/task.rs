//! Typed background tasks and their wire envelope.
//!
//! On the wire a task is a kind string plus a JSON payload. Inside the
//! process it is a [`Task`] variant, so dispatch is an exhaustive `match`:
//!
//! ```json
//! {
//!   "id": "6f1c…",
//!   "kind": "send-notification",
//!   "payload": { "receiver_id": 7, "title": "Order shipped", "content": "…" },
//!   "max_retry": 25,
//!   "retried": 0,
//!   "enqueued_at": "2025-01-01T00:00:00Z"
//! }
//! ```

use crate::error::{QueueError, TaskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ticket_core::AccountId;
use uuid::Uuid;

/// Queue used when none is specified.
pub const DEFAULT_QUEUE: &str = "default";

/// Retry budget used when none is specified.
pub const DEFAULT_MAX_RETRY: u32 = 25;

/// Known task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Account verification email.
    SendVerifyEmail,
    /// In-app notification to one account.
    SendNotification,
}

impl TaskKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendVerifyEmail => "send-verify-email",
            Self::SendNotification => "send-notification",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send-verify-email" => Ok(Self::SendVerifyEmail),
            "send-notification" => Ok(Self::SendNotification),
            other => Err(TaskError::UnknownKind(other.to_string())),
        }
    }
}

/// Payload of `send-verify-email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmailPayload {
    /// Recipient address.
    pub email: String,
    /// Display name used in the greeting.
    pub username: String,
    /// Verification link.
    pub link: String,
}

/// Payload of `send-notification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Recipient account.
    pub receiver_id: AccountId,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub content: String,
}

/// A background task with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Send the account verification email.
    SendVerifyEmail(VerifyEmailPayload),
    /// Push a notification (or fall back when the receiver is offline).
    SendNotification(NotificationPayload),
}

impl Task {
    /// The task's kind.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::SendVerifyEmail(_) => TaskKind::SendVerifyEmail,
            Self::SendNotification(_) => TaskKind::SendNotification,
        }
    }

    /// Encode the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if encoding fails.
    pub fn payload(&self) -> Result<serde_json::Value, QueueError> {
        let value = match self {
            Self::SendVerifyEmail(payload) => serde_json::to_value(payload),
            Self::SendNotification(payload) => serde_json::to_value(payload),
        };
        value.map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Decode a wire kind and payload.
    ///
    /// # Errors
    ///
    /// - [`TaskError::UnknownKind`] for an unrecognised kind
    /// - [`TaskError::InvalidPayload`] if the payload does not match the kind
    pub fn decode(kind: &str, payload: &serde_json::Value) -> Result<Self, TaskError> {
        let invalid = |e: serde_json::Error| TaskError::InvalidPayload {
            kind: kind.to_string(),
            reason: e.to_string(),
        };

        match kind.parse::<TaskKind>()? {
            TaskKind::SendVerifyEmail => VerifyEmailPayload::deserialize(payload)
                .map(Self::SendVerifyEmail)
                .map_err(invalid),
            TaskKind::SendNotification => NotificationPayload::deserialize(payload)
                .map(Self::SendNotification)
                .map_err(invalid),
        }
    }
}

/// Per-enqueue options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Target queue name.
    ///
    /// Default: `default`
    pub queue: String,

    /// Retries allowed after the first failed attempt.
    ///
    /// Default: 25
    pub max_retry: u32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            max_retry: DEFAULT_MAX_RETRY,
        }
    }
}

impl EnqueueOptions {
    /// Set the target queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }
}

/// A task as stored in a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Unique task ID.
    pub id: Uuid,
    /// Wire kind.
    pub kind: String,
    /// JSON payload, decoded per kind at dispatch.
    pub payload: serde_json::Value,
    /// Retry budget.
    pub max_retry: u32,
    /// Retries consumed so far.
    #[serde(default)]
    pub retried: u32,
    /// When the task was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Last failure, set when retried or dead-lettered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TaskEnvelope {
    /// Wrap a typed task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if the payload cannot be encoded.
    pub fn new(task: &Task, max_retry: u32) -> Result<Self, QueueError> {
        Ok(Self::from_parts(task.kind().as_str(), task.payload()?, max_retry))
    }

    /// Wrap a raw kind and payload.
    #[must_use]
    pub fn from_parts(kind: &str, payload: serde_json::Value, max_retry: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            payload,
            max_retry,
            retried: 0,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Decode into a typed task.
    ///
    /// # Errors
    ///
    /// See [`Task::decode`].
    pub fn decode(&self) -> Result<Task, TaskError> {
        Task::decode(&self.kind, &self.payload)
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retried < self.max_retry
    }

    /// The envelope for the next attempt.
    #[must_use]
    pub fn next_attempt(&self, error: &str) -> Self {
        Self {
            retried: self.retried.saturating_add(1),
            last_error: Some(error.to_string()),
            ..self.clone()
        }
    }

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_known_kinds() {
        let task = Task::decode(
            "send-notification",
            &json!({"receiver_id": 7, "title": "Hi", "content": "There"}),
        )
        .unwrap();
        assert_eq!(
            task,
            Task::SendNotification(NotificationPayload {
                receiver_id: AccountId::new(7),
                title: "Hi".into(),
                content: "There".into(),
            })
        );

        let task = Task::decode(
            "send-verify-email",
            &json!({"email": "a@b.c", "username": "ann", "link": "https://x/verify"}),
        )
        .unwrap();
        assert_eq!(task.kind(), TaskKind::SendVerifyEmail);
    }

    #[test]
    fn test_unknown_kind() {
        let err = Task::decode("send-welcome-email", &json!({})).unwrap_err();
        assert!(matches!(err, TaskError::UnknownKind(kind) if kind == "send-welcome-email"));
    }

    #[test]
    fn test_payload_mismatch() {
        let err = Task::decode("send-notification", &json!({"title": "no receiver"})).unwrap_err();
        assert!(matches!(err, TaskError::InvalidPayload { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn test_envelope_wire_shape() {
        let task = Task::SendNotification(NotificationPayload {
            receiver_id: AccountId::new(3),
            title: "t".into(),
            content: "c".into(),
        });
        let envelope = TaskEnvelope::new(&task, 1).unwrap();
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], "send-notification");
        assert_eq!(value["payload"]["receiver_id"], 3);
        assert_eq!(value["max_retry"], 1);
        assert_eq!(value["retried"], 0);
        assert!(value.get("last_error").is_none());
        assert_eq!(envelope.decode().unwrap(), task);
    }

    #[test]
    fn test_retry_budget() {
        let envelope = TaskEnvelope::from_parts("send-notification", json!({}), 1);
        assert!(envelope.can_retry());

        let next = envelope.next_attempt("boom");
        assert_eq!(next.id, envelope.id);
        assert_eq!(next.retried, 1);
        assert_eq!(next.last_error.as_deref(), Some("boom"));
        assert!(!next.can_retry());
    }

    #[test]
    fn test_enqueue_options() {
        let options = EnqueueOptions::default();
        assert_eq!(options.queue, "default");
        assert_eq!(options.max_retry, 25);

        let options = options.with_queue("mail").with_max_retry(1);
        assert_eq!(options.queue, "mail");
        assert_eq!(options.max_retry, 1);
    }
}
