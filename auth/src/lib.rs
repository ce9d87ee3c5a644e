//! # Ticket Auth
//!
//! Session tokens and session invalidation for the ticket platform.
//!
//! ## Features
//!
//! - **Stateless tokens**: HS256 access/refresh tokens with role and version
//! - **Global logout**: bumping an account's token version invalidates every
//!   token issued before
//! - **Fast path**: versions are cached (Redis) and fall back to the
//!   authoritative store (`PostgreSQL`) on a miss or cache outage
//! - **Testable**: in-memory mocks for both providers
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_auth::mocks::{MockSessionCache, MockTokenVersionStore};
//! use ticket_auth::{SessionService, TokenConfig, TokenService};
//! use ticket_core::{AccountId, Role, TokenVersion};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MockTokenVersionStore::new().with_account(AccountId::new(1), TokenVersion::initial());
//! let sessions = SessionService::new(
//!     TokenService::new(TokenConfig::new("change-me"))?,
//!     Arc::new(MockSessionCache::new()),
//!     Arc::new(store),
//! );
//!
//! let pair = sessions.issue(AccountId::new(1), Role::User).await?;
//! assert!(sessions.authenticate(&pair.access_token).await.is_ok());
//!
//! sessions.revoke_all(AccountId::new(1)).await?;
//! assert!(sessions.authenticate(&pair.access_token).await.is_err());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod claims;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod stores;
pub mod token;

/// In-memory provider implementations.
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use claims::{RegisteredClaims, SessionClaims, TokenKind};
pub use config::TokenConfig;
pub use error::{AuthError, CacheError, Result, StoreError, TokenError};
pub use providers::{SessionCache, TokenVersionStore};
pub use session::{SessionService, TokenPair};
pub use token::TokenService;
