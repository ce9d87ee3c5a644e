//! Mock implementations for testing.

use crate::error::{MailError, TaskError};
use crate::handlers::TaskHandler;
use crate::mail::{EmailMessage, Mailer};
use crate::task::Task;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mailer that records messages instead of sending them.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failure: Arc<Mutex<Option<MailError>>>,
}

impl MockMailer {
    /// Create a mailer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Fail every send with `error`, or accept again with `None`.
    pub fn fail_with(&self, error: Option<MailError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if let Some(error) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(error);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

/// Handler that records tasks and replays scripted outcomes.
///
/// Each call pops the next scripted result; once the script is empty every
/// call succeeds.
#[derive(Debug, Clone, Default)]
pub struct MockTaskHandler {
    handled: Arc<Mutex<Vec<Task>>>,
    script: Arc<Mutex<VecDeque<Result<(), TaskError>>>>,
}

impl MockTaskHandler {
    /// Create a handler that succeeds on every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next call.
    #[must_use]
    pub fn then(self, outcome: Result<(), TaskError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Tasks handled so far, in order.
    #[must_use]
    pub fn handled(&self) -> Vec<Task> {
        self.handled.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TaskHandler for MockTaskHandler {
    async fn handle(&self, task: Task) -> Result<(), TaskError> {
        if let Ok(mut handled) = self.handled.lock() {
            handled.push(task);
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}
