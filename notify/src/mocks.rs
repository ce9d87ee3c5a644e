//! Mock connection for testing.

use crate::connection::{Connection, ConnectionId};
use crate::error::ConnectionError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory connection that records what it was sent.
///
/// Clones share state and identity, so a test can keep one handle and
/// register another with the hub.
#[derive(Debug, Clone)]
pub struct MockConnection {
    id: ConnectionId,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    fail_sends: Arc<AtomicBool>,
    stall: Arc<Mutex<Option<Duration>>>,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    /// Create an open connection with a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_sends: Arc::new(AtomicBool::new(false)),
            stall: Arc::new(Mutex::new(None)),
        }
    }

    /// Messages accepted so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// How many times the connection actually transitioned to closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Make every send fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make every send and close hang for `delay` before completing.
    ///
    /// A stalled close marks the connection closed before hanging.
    pub fn stall(&self, delay: Duration) {
        if let Ok(mut stall) = self.stall.lock() {
            *stall = Some(delay);
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        let stall = self.stall.lock().ok().and_then(|stall| *stall);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("simulated failure".to_string()));
        }

        self.sent
            .lock()
            .map_err(|_| ConnectionError::Transport("Mutex lock failed".to_string()))?
            .push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        let stall = self.stall.lock().ok().and_then(|stall| *stall);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
    }
}
