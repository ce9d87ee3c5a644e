//! Session cache trait.

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;
use ticket_core::{AccountId, TokenVersion};

/// Fast key-value cache of account ID → current token version.
///
/// # Implementation Notes
///
/// - Key is the decimal account ID, value is the decimal version
/// - Entries expire (about an hour); a miss is never an error
/// - Errors are non-fatal to callers, which fall back to the durable store
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Raw cached value for the account, `None` on a miss.
    ///
    /// The value is returned unparsed; callers treat garbage as a miss.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the cache cannot be reached.
    async fn get_version(&self, account_id: AccountId) -> Result<Option<String>, CacheError>;

    /// Store the account's current version with a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the cache cannot be reached.
    async fn set_version(
        &self,
        account_id: AccountId,
        version: TokenVersion,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop the account's cached version, so the next read goes to the
    /// durable store. Deleting a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the cache cannot be reached.
    async fn delete_version(&self, account_id: AccountId) -> Result<(), CacheError>;
}
