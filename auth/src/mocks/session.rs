//! Mock session cache for testing.

use crate::error::CacheError;
use crate::providers::SessionCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticket_core::{AccountId, TokenVersion};

/// Mock session cache.
///
/// Uses in-memory storage; TTLs are recorded but never enforced. Clones
/// share state, so a test can keep a handle after moving one into a service.
#[derive(Debug, Clone, Default)]
pub struct MockSessionCache {
    entries: Arc<Mutex<HashMap<AccountId, String>>>,
    unavailable: Arc<AtomicBool>,
    failing_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MockSessionCache {
    /// Create an empty mock cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a raw value in the cache, bypassing validation.
    pub fn insert_raw(&self, account_id: AccountId, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(account_id, value.to_string());
        }
    }

    /// Raw cached value, if any.
    #[must_use]
    pub fn raw(&self, account_id: AccountId) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&account_id).cloned())
    }

    /// Simulate an outage: every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `set_version` fail while reads and deletes keep working.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionCache for MockSessionCache {
    async fn get_version(&self, account_id: AccountId) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("Mutex lock failed".to_string()))?;
        Ok(entries.get(&account_id).cloned())
    }

    async fn set_version(
        &self,
        account_id: AccountId,
        version: TokenVersion,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.check_available()?;
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("simulated write failure".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("Mutex lock failed".to_string()))?
            .insert(account_id, version.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_version(&self, account_id: AccountId) -> Result<(), CacheError> {
        self.check_available()?;
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("Mutex lock failed".to_string()))?
            .remove(&account_id);
        Ok(())
    }
}
