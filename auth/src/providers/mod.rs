//! Session providers.
//!
//! Traits for the two external dependencies of session validation. Both are
//! object-safe so the web layer can hold them as `Arc<dyn ...>`:
//!
//! - **Testing**: in-memory mocks from [`crate::mocks`]
//! - **Production**: Redis for the cache, `PostgreSQL` for the version column
//!
//! ```text
//! SessionService::resolve_version(id)
//!        │
//!        ▼
//! ┌──────────────┐  hit   ┌──────────────────┐
//! │ SessionCache │───────▶│ version          │
//! └──────┬───────┘        └──────────────────┘
//!        │ miss / error            ▲
//!        ▼                         │ write back
//! ┌───────────────────┐            │
//! │ TokenVersionStore │────────────┘
//! └───────────────────┘
//! ```

pub mod session;
pub mod token_version;

pub use session::SessionCache;
pub use token_version::TokenVersionStore;
