//! Mock token version store for testing.

use crate::error::StoreError;
use crate::providers::TokenVersionStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ticket_core::{AccountId, TokenVersion};

/// Mock token version store.
///
/// In-memory stand-in for the `accounts.token_version` column.
#[derive(Debug, Clone, Default)]
pub struct MockTokenVersionStore {
    versions: Arc<Mutex<HashMap<AccountId, TokenVersion>>>,
    unavailable: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl MockTokenVersionStore {
    /// Create an empty store (every lookup is `AccountNotFound`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account at the given version.
    #[must_use]
    pub fn with_account(self, account_id: AccountId, version: TokenVersion) -> Self {
        if let Ok(mut versions) = self.versions.lock() {
            versions.insert(account_id, version);
        }
        self
    }

    /// Simulate a database outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `current_version` calls so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenVersionStore for MockTokenVersionStore {
    async fn current_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        self.versions
            .lock()
            .map_err(|_| StoreError::Database("Mutex lock failed".to_string()))?
            .get(&account_id)
            .copied()
            .ok_or(StoreError::AccountNotFound(account_id))
    }

    async fn increment_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError> {
        self.check_available()?;

        let mut versions = self
            .versions
            .lock()
            .map_err(|_| StoreError::Database("Mutex lock failed".to_string()))?;
        let version = versions
            .get_mut(&account_id)
            .ok_or(StoreError::AccountNotFound(account_id))?;
        *version = version.next();
        Ok(*version)
    }
}
