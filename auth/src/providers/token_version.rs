//! Durable token version store trait.

use crate::error::StoreError;
use async_trait::async_trait;
use ticket_core::{AccountId, TokenVersion};

/// Authoritative per-account token version (the `accounts.token_version`
/// column).
#[async_trait]
pub trait TokenVersionStore: Send + Sync {
    /// Current version of the account.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AccountNotFound`] if there is no such account
    /// - [`StoreError::Database`] on query failure
    async fn current_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError>;

    /// Atomically bump the version, invalidating every issued token.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AccountNotFound`] if there is no such account
    /// - [`StoreError::Database`] on query failure
    async fn increment_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError>;
}
