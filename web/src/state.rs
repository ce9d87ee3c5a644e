//! Application state for Axum handlers.

use std::sync::Arc;
use ticket_auth::SessionService;
use ticket_notify::Hub;
use ticket_runtime::{EnqueueOptions, TaskQueue};

/// Application state shared across all HTTP handlers.
///
/// Every field is reference-counted, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Token verification, issuance and revocation.
    pub sessions: Arc<SessionService>,
    /// Realtime connection registry.
    pub hub: Arc<Hub>,
    /// Background task queue.
    pub queue: Arc<dyn TaskQueue>,
    /// Queue and retry budget for tasks enqueued by handlers.
    pub enqueue: EnqueueOptions,
}

impl AppState {
    /// Create the state with default enqueue options.
    #[must_use]
    pub fn new(sessions: Arc<SessionService>, hub: Arc<Hub>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            sessions,
            hub,
            queue,
            enqueue: EnqueueOptions::default(),
        }
    }

    /// Set the enqueue options.
    #[must_use]
    pub fn with_enqueue_options(mut self, enqueue: EnqueueOptions) -> Self {
        self.enqueue = enqueue;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("hub", &self.hub)
            .field("enqueue", &self.enqueue)
            .finish_non_exhaustive()
    }
}
