//! # Ticket Core
//!
//! Shared vocabulary for the ticket platform crates.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`AccountId`]: the numeric identity of an account (tokens, hub, tasks)
//! - [`Role`]: the closed set of account roles
//! - [`TokenVersion`]: the per-account counter used for session invalidation
//! - [`environment::Clock`]: injected time source
//!
//! ## Example
//!
//! ```
//! use ticket_core::{AccountId, Role, TokenVersion};
//!
//! let id: AccountId = "42".parse().unwrap();
//! let role: Role = "organiser".parse().unwrap();
//!
//! assert_eq!(id, AccountId::new(42));
//! assert_eq!(role, Role::Organiser);
//! assert_eq!(TokenVersion::initial().next(), TokenVersion::new(1));
//! ```

pub mod account;

// Re-export commonly used types
pub use account::{AccountId, ParseError, Role, TokenVersion};
pub use chrono::{DateTime, Utc};

/// Environment module - injected dependencies shared by all crates.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(Utc::now() - Duration::hours(2));
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
