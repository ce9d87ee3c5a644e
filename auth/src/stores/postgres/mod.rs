//! PostgreSQL storage implementations.
//!
//! Only the `accounts.token_version` column is read and written here; the
//! rest of the accounts schema belongs to the account service.

pub mod version;

// Re-exports
pub use version::PostgresTokenVersionStore;
