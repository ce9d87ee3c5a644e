//! PostgreSQL token version store.
//!
//! # Example
//!
//! ```no_run
//! use ticket_auth::stores::postgres::PostgresTokenVersionStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/tickets").await?;
//! let store = PostgresTokenVersionStore::new(pool);
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use crate::providers::TokenVersionStore;
use async_trait::async_trait;
use sqlx::PgPool;
use ticket_core::{AccountId, TokenVersion};

/// PostgreSQL-backed token version store.
#[derive(Clone)]
pub struct PostgresTokenVersionStore {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresTokenVersionStore {
    /// Create a new store.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn db_id(account_id: AccountId) -> Result<i64, StoreError> {
        // Larger IDs cannot exist in a BIGINT column.
        i64::try_from(account_id.get()).map_err(|_| StoreError::AccountNotFound(account_id))
    }
}

#[async_trait]
impl TokenVersionStore for PostgresTokenVersionStore {
    async fn current_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError> {
        let id = Self::db_id(account_id)?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT token_version::BIGINT FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to read token version: {e}")))?;

        version
            .map(TokenVersion::new)
            .ok_or(StoreError::AccountNotFound(account_id))
    }

    async fn increment_version(&self, account_id: AccountId) -> Result<TokenVersion, StoreError> {
        let id = Self::db_id(account_id)?;

        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET token_version = token_version + 1
            WHERE id = $1
            RETURNING token_version::BIGINT
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to bump token version: {e}")))?;

        version
            .map(TokenVersion::new)
            .ok_or(StoreError::AccountNotFound(account_id))
    }
}
