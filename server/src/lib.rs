//! # Ticket Server
//!
//! Wiring for the ticket platform binary: environment configuration and the
//! startup helpers used by `main`.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod startup;

pub use config::{Config, ConfigError};
