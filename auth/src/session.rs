//! Session validation, issuance and revocation.
//!
//! [`SessionService`] ties the stateless [`TokenService`] to the stateful
//! token version. A request token walks
//!
//! ```text
//! Unauthenticated ──verify──▶ TokenVerified ──version──▶ VersionChecked ──▶ Authorized
//!        │                         │                           │
//!        └── MissingToken          └── InvalidToken            └── StaleToken / Internal
//! ```
//!
//! Version resolution prefers the [`SessionCache`] and degrades to the
//! [`TokenVersionStore`] on a miss or cache failure. Only a store failure
//! fails the request.

use crate::claims::{SessionClaims, TokenKind};
use crate::error::{AuthError, Result, TokenError};
use crate::providers::{SessionCache, TokenVersionStore};
use crate::token::TokenService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticket_core::{AccountId, Role, TokenVersion};
use tracing::{debug, error, info, warn};

/// Access and refresh token issued together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Token for `Authorization: Bearer` on requests.
    pub access_token: String,
    /// Token for `POST /api/auth/refresh`.
    pub refresh_token: String,
}

/// Session service.
#[derive(Clone)]
pub struct SessionService {
    tokens: TokenService,
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn TokenVersionStore>,
}

impl SessionService {
    /// Create a session service.
    #[must_use]
    pub fn new(
        tokens: TokenService,
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn TokenVersionStore>,
    ) -> Self {
        Self {
            tokens,
            cache,
            store,
        }
    }

    /// The underlying token service.
    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate a request token.
    ///
    /// Accepts only access tokens whose version equals the account's current
    /// version.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`]: empty token
    /// - [`AuthError::InvalidToken`]: fails verification, or is a refresh token
    /// - [`AuthError::StaleToken`]: version behind the account's
    /// - [`AuthError::UnknownAccount`]: account no longer exists
    /// - [`AuthError::Internal`]: durable store unavailable
    pub async fn authenticate(&self, token: &str) -> Result<SessionClaims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.tokens.verify_token(token)?;
        if claims.kind() != TokenKind::Access {
            return Err(AuthError::InvalidToken(TokenError::InvalidTokenKind(
                claims.kind().to_string(),
            )));
        }

        self.check_version(&claims).await?;
        Ok(claims)
    }

    /// Ensure the role is one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] otherwise.
    pub fn authorize(claims: &SessionClaims, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&claims.role()) {
            return Ok(());
        }

        let required = allowed
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        debug!(account_id = %claims.account_id(), role = %claims.role(), %required, "Role not permitted");
        Err(AuthError::Forbidden { required })
    }

    /// Current token version of the account.
    ///
    /// Cache hit → parsed value. Miss, unparseable value or cache error →
    /// durable store, then a best-effort write back into the cache.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownAccount`]: no such account in the store
    /// - [`AuthError::Internal`]: store failure
    pub async fn resolve_version(&self, account_id: AccountId) -> Result<TokenVersion> {
        match self.cache.get_version(account_id).await {
            Ok(Some(raw)) => match raw.parse::<TokenVersion>() {
                Ok(version) => return Ok(version),
                Err(e) => warn!(%account_id, error = %e, "Unparseable cached token version, treating as miss"),
            },
            Ok(None) => debug!(%account_id, "Session cache miss"),
            Err(e) => warn!(%account_id, error = %e, "Session cache unavailable, falling back to store"),
        }

        let version = self.store.current_version(account_id).await.map_err(|e| {
            warn!(%account_id, error = %e, "Token version lookup failed");
            AuthError::from(e)
        })?;

        self.write_back(account_id, version).await;
        Ok(version)
    }

    /// Issue an access/refresh pair at the account's current version.
    ///
    /// # Errors
    ///
    /// Version resolution errors, or [`AuthError::Internal`] if signing fails.
    pub async fn issue(&self, account_id: AccountId, role: Role) -> Result<TokenPair> {
        let version = self.resolve_version(account_id).await?;

        let access_token = self.sign(account_id, role, TokenKind::Access, version)?;
        let refresh_token = self.sign(account_id, role, TokenKind::Refresh, version)?;
        info!(%account_id, %role, %version, "Issued session tokens");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a current refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`]: fails verification
    /// - [`AuthError::WrongTokenKind`]: an access token was presented
    /// - [`AuthError::StaleToken`]: sessions were revoked since issuance
    /// - version resolution errors
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let token = refresh_token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.tokens.verify_token(token)?;
        if claims.kind() != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind {
                expected: TokenKind::Refresh,
            });
        }

        self.check_version(&claims).await?;

        let access_token = self.sign(
            claims.account_id(),
            claims.role(),
            TokenKind::Access,
            claims.version(),
        )?;
        debug!(account_id = %claims.account_id(), "Refreshed access token");
        Ok(access_token)
    }

    /// Invalidate every token issued to the account.
    ///
    /// Bumps the durable version, then overwrites the cached value. If that
    /// write fails the cached entry is deleted instead, so the next check
    /// reads the new version from the store. Only when both fail can an old
    /// token pass until the entry's TTL runs out.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownAccount`]: no such account
    /// - [`AuthError::Internal`]: store failure
    pub async fn revoke_all(&self, account_id: AccountId) -> Result<TokenVersion> {
        let version = self.store.increment_version(account_id).await?;

        let ttl = self.tokens.config().effective_cache_ttl();
        if let Err(e) = self.cache.set_version(account_id, version, ttl).await {
            warn!(%account_id, error = %e, "Failed to cache revoked version, evicting entry");
            if let Err(e) = self.cache.delete_version(account_id).await {
                error!(
                    %account_id,
                    error = %e,
                    "Failed to evict cached version, old tokens pass until it expires"
                );
            }
        }

        info!(%account_id, %version, "Revoked all sessions");
        Ok(version)
    }

    async fn check_version(&self, claims: &SessionClaims) -> Result<()> {
        let current = self.resolve_version(claims.account_id()).await?;
        if claims.version() != current {
            debug!(
                account_id = %claims.account_id(),
                token_version = %claims.version(),
                current_version = %current,
                "Stale token"
            );
            return Err(AuthError::StaleToken);
        }
        Ok(())
    }

    fn sign(
        &self,
        account_id: AccountId,
        role: Role,
        kind: TokenKind,
        version: TokenVersion,
    ) -> Result<String> {
        self.tokens
            .create_token(account_id, role, kind, version)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn write_back(&self, account_id: AccountId, version: TokenVersion) {
        let ttl = self.tokens.config().effective_cache_ttl();
        if let Err(e) = self.cache.set_version(account_id, version, ttl).await {
            warn!(%account_id, error = %e, "Failed to cache token version");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::mocks::{MockSessionCache, MockTokenVersionStore};

    fn setup() -> (SessionService, MockSessionCache, MockTokenVersionStore) {
        let cache = MockSessionCache::new();
        let store = MockTokenVersionStore::new()
            .with_account(AccountId::new(1), TokenVersion::new(0))
            .with_account(AccountId::new(2), TokenVersion::new(5));
        let tokens = TokenService::new(TokenConfig::new("session-secret")).unwrap();
        let service = SessionService::new(tokens, Arc::new(cache.clone()), Arc::new(store.clone()));
        (service, cache, store)
    }

    #[tokio::test]
    async fn test_issue_then_authenticate() {
        let (service, cache, _) = setup();

        let pair = service.issue(AccountId::new(2), Role::Staff).await.unwrap();
        assert_eq!(cache.raw(AccountId::new(2)).as_deref(), Some("5"));

        let claims = service.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(claims.account_id(), AccountId::new(2));
        assert_eq!(claims.version(), TokenVersion::new(5));
    }

    #[tokio::test]
    async fn test_refresh_token_not_accepted_for_requests() {
        let (service, _, _) = setup();
        let pair = service.issue(AccountId::new(1), Role::User).await.unwrap();

        let err = service.authenticate(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(TokenError::InvalidTokenKind(_))));
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_kind() {
        let (service, _, _) = setup();
        let pair = service.issue(AccountId::new(1), Role::User).await.unwrap();

        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert_eq!(err, AuthError::WrongTokenKind { expected: TokenKind::Refresh });

        let access = service.refresh(&pair.refresh_token).await.unwrap();
        let claims = service.authenticate(&access).await.unwrap();
        assert_eq!(claims.role(), Role::User);
    }

    #[tokio::test]
    async fn test_revoke_all_invalidates_both_tokens() {
        let (service, cache, _) = setup();
        let pair = service.issue(AccountId::new(1), Role::Admin).await.unwrap();

        let version = service.revoke_all(AccountId::new(1)).await.unwrap();
        assert_eq!(version, TokenVersion::new(1));
        assert_eq!(cache.raw(AccountId::new(1)).as_deref(), Some("1"));

        assert_eq!(service.authenticate(&pair.access_token).await.unwrap_err(), AuthError::StaleToken);
        assert_eq!(service.refresh(&pair.refresh_token).await.unwrap_err(), AuthError::StaleToken);
    }

    #[tokio::test]
    async fn test_issue_writes_cache_once() {
        let (service, cache, store) = setup();

        service.issue(AccountId::new(2), Role::User).await.unwrap();
        assert_eq!(store.read_count(), 1);
        assert_eq!(cache.write_count(), 1);

        // A cache hit needs no write at all.
        service.issue(AccountId::new(2), Role::User).await.unwrap();
        assert_eq!(store.read_count(), 1);
        assert_eq!(cache.write_count(), 1);
    }

    #[tokio::test]
    async fn test_revoke_all_evicts_cache_when_write_fails() {
        let (service, cache, store) = setup();
        let pair = service.issue(AccountId::new(1), Role::User).await.unwrap();
        assert_eq!(cache.raw(AccountId::new(1)).as_deref(), Some("0"));

        cache.set_failing_writes(true);
        service.revoke_all(AccountId::new(1)).await.unwrap();
        assert_eq!(cache.raw(AccountId::new(1)), None);

        let reads = store.read_count();
        assert_eq!(service.authenticate(&pair.access_token).await.unwrap_err(), AuthError::StaleToken);
        assert_eq!(store.read_count(), reads + 1);
    }

    #[tokio::test]
    async fn test_revoke_all_succeeds_with_cache_down() {
        let (service, cache, _) = setup();
        let pair = service.issue(AccountId::new(1), Role::User).await.unwrap();

        cache.set_unavailable(true);
        assert_eq!(service.revoke_all(AccountId::new(1)).await.unwrap(), TokenVersion::new(1));
        assert_eq!(service.authenticate(&pair.access_token).await.unwrap_err(), AuthError::StaleToken);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let (service, cache, store) = setup();
        cache.insert_raw(AccountId::new(2), "5");

        assert_eq!(service.resolve_version(AccountId::new(2)).await.unwrap(), TokenVersion::new(5));
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_garbage_in_cache_is_a_miss() {
        let (service, cache, store) = setup();
        cache.insert_raw(AccountId::new(2), "not-a-number");

        assert_eq!(service.resolve_version(AccountId::new(2)).await.unwrap(), TokenVersion::new(5));
        assert_eq!(store.read_count(), 1);
        // Repaired by the write back.
        assert_eq!(cache.raw(AccountId::new(2)).as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let (service, _, store) = setup();
        store.set_unavailable(true);

        let err = service.resolve_version(AccountId::new(1)).await.unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (service, _, _) = setup();
        let err = service.resolve_version(AccountId::new(99)).await.unwrap_err();
        assert_eq!(err, AuthError::UnknownAccount(AccountId::new(99)));
    }

    #[tokio::test]
    async fn test_empty_token_is_missing() {
        let (service, _, _) = setup();
        assert_eq!(service.authenticate("   ").await.unwrap_err(), AuthError::MissingToken);
    }

    #[tokio::test]
    async fn test_authorize_roles() {
        let (service, _, _) = setup();
        let pair = service.issue(AccountId::new(1), Role::Staff).await.unwrap();
        let claims = service.authenticate(&pair.access_token).await.unwrap();

        assert!(SessionService::authorize(&claims, &[Role::Admin, Role::Staff]).is_ok());
        assert_eq!(
            SessionService::authorize(&claims, &[Role::Admin, Role::Organiser]).unwrap_err(),
            AuthError::Forbidden { required: "admin, organiser".into() }
        );
    }
}
