//! # Ticket Testing
//!
//! Testing utilities shared across the ticket platform crates.
//!
//! This crate provides:
//! - Deterministic clocks for token issuance tests
//! - One-shot tracing initialisation for tests that want log output
//!
//! ## Example
//!
//! ```ignore
//! use ticket_testing::{clock_offset, test_clock};
//!
//! // Issue a token "two hours ago" so it is already expired.
//! let service = TokenService::with_clock(config, Arc::new(clock_offset(Duration::hours(-2))));
//! ```

use chrono::{DateTime, Duration, Utc};
use ticket_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_testing::mocks::FixedClock;
    /// use ticket_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Clock pinned at "now plus `offset`".
///
/// Negative offsets are handy for minting tokens that are already expired
/// (or just inside the verification leeway) against the real wall clock.
#[must_use]
pub fn clock_offset(offset: Duration) -> FixedClock {
    FixedClock::new(Utc::now() + offset)
}

/// Install a fmt subscriber honouring `RUST_LOG`, once per process.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
