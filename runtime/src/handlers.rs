//! Task handlers.

use crate::error::TaskError;
use crate::mail::{verify_email_message, Mailer};
use crate::task::{NotificationPayload, Task, VerifyEmailPayload};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use ticket_notify::{Hub, NotifyError};

/// Executes one decoded task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run `task` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] on failure; the processor decides between
    /// retry and dead-letter with [`TaskError::is_permanent`].
    async fn handle(&self, task: Task) -> Result<(), TaskError>;
}

/// Message pushed to an online receiver.
#[derive(Debug, Serialize)]
struct InAppNotification<'a> {
    title: &'a str,
    content: &'a str,
}

/// Handles every [`Task`] kind the platform enqueues.
#[derive(Clone)]
pub struct AppTaskHandler {
    mailer: Arc<dyn Mailer>,
    hub: Arc<Hub>,
}

impl AppTaskHandler {
    /// Create a handler over the shared mailer and hub.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, hub: Arc<Hub>) -> Self {
        Self { mailer, hub }
    }

    async fn send_verify_email(&self, payload: VerifyEmailPayload) -> Result<(), TaskError> {
        let message = verify_email_message(&payload);
        self.mailer.send(message).await?;

        tracing::info!(email = %payload.email, "Verification email sent");
        Ok(())
    }

    async fn send_notification(&self, payload: NotificationPayload) -> Result<(), TaskError> {
        let receiver_id = payload.receiver_id;

        if self.hub.is_online(receiver_id) {
            let message = InAppNotification {
                title: &payload.title,
                content: &payload.content,
            };

            match self.hub.publish(receiver_id, &message).await {
                Ok(()) => {
                    tracing::debug!(receiver_id = %receiver_id, "In-app notification delivered");
                    return Ok(());
                }
                // Went offline between the check and the publish.
                Err(NotifyError::RecipientNotRegistered(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            receiver_id = %receiver_id,
            title = %payload.title,
            content = %payload.content,
            "Send notification to offline user"
        );
        Ok(())
    }
}

impl std::fmt::Debug for AppTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppTaskHandler")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TaskHandler for AppTaskHandler {
    async fn handle(&self, task: Task) -> Result<(), TaskError> {
        match task {
            Task::SendVerifyEmail(payload) => self.send_verify_email(payload).await,
            Task::SendNotification(payload) => self.send_notification(payload).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::MailError;
    use crate::mocks::MockMailer;
    use ticket_core::AccountId;
    use ticket_notify::mocks::MockConnection;

    fn handler() -> (AppTaskHandler, MockMailer, Arc<Hub>) {
        let mailer = MockMailer::new();
        let hub = Arc::new(Hub::new());
        let handler = AppTaskHandler::new(Arc::new(mailer.clone()), Arc::clone(&hub));
        (handler, mailer, hub)
    }

    fn notification(receiver: u64) -> Task {
        Task::SendNotification(NotificationPayload {
            receiver_id: AccountId::new(receiver),
            title: "Order shipped".into(),
            content: "Your tickets are on the way".into(),
        })
    }

    #[tokio::test]
    async fn test_verify_email_is_sent() {
        let (handler, mailer, _hub) = handler();

        handler
            .handle(Task::SendVerifyEmail(VerifyEmailPayload {
                email: "ann@example.com".into(),
                username: "ann".into(),
                link: "https://ticket.example.com/verify".into(),
            }))
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ann@example.com");
        assert_eq!(sent[0].subject, "Welcome to Ticket - Verify your account");
    }

    #[tokio::test]
    async fn test_mail_failure_is_retryable() {
        let (handler, mailer, _hub) = handler();
        mailer.fail_with(Some(MailError::Transport("connection refused".into())));

        let err = handler
            .handle(Task::SendVerifyEmail(VerifyEmailPayload {
                email: "ann@example.com".into(),
                username: "ann".into(),
                link: "https://ticket.example.com/verify".into(),
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Mail(MailError::Transport(_))));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_online_receiver_gets_message() {
        let (handler, _mailer, hub) = handler();
        let connection = MockConnection::new();
        hub.subscribe(AccountId::new(7), Arc::new(connection.clone()))
            .await;

        handler.handle(notification(7)).await.unwrap();

        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Order shipped",
                "content": "Your tickets are on the way"
            })
        );
    }

    #[tokio::test]
    async fn test_offline_receiver_falls_back() {
        let (handler, _mailer, _hub) = handler();
        handler.handle(notification(8)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delivery_failure_is_returned() {
        let (handler, _mailer, hub) = handler();
        let connection = MockConnection::new();
        connection.fail_sends(true);
        hub.subscribe(AccountId::new(9), Arc::new(connection.clone()))
            .await;

        let err = handler.handle(notification(9)).await.unwrap_err();

        assert!(matches!(
            err,
            TaskError::Notify(NotifyError::Delivery { .. })
        ));
        assert!(!err.is_permanent());
    }
}
