//! Mock provider implementations for testing.
//!
//! Simple, in-memory implementations of the provider traits for use in unit
//! and integration tests (here and in the web crate). Both can be switched
//! into a failing mode to exercise the degraded paths.

pub mod session;
pub mod token_version;

pub use session::MockSessionCache;
pub use token_version::MockTokenVersionStore;
