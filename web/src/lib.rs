//! Axum HTTP surface for the ticket platform.
//!
//! This crate is the imperative shell around the session, notification and
//! task crates: it extracts tokens and JSON, calls into the services, and
//! maps typed errors onto HTTP responses.
//!
//! # Request Flow
//!
//! 1. **Request ID** assigned (or propagated) and recorded on the trace span
//! 2. **CORS** headers applied; preflights answered
//! 3. **Authenticate** the bearer token on protected routes
//! 4. **Authorize** the caller's role where a route requires one
//! 5. **Handle** the request and map the result to a response
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticket_web::{AppState, router};
//!
//! let state = AppState::new(Arc::new(sessions), Arc::new(hub), Arc::new(queue));
//! let app = router(state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AuthClaims, BearerToken};
pub use middleware::{REQUEST_ID_HEADER, require_auth, require_roles};
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
