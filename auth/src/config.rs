//! Authentication configuration.
//!
//! Configuration values are provided by the application (see the server's
//! environment loader), never hardcoded beyond the defaults below.

use chrono::Duration;
use std::fmt;

/// Issuer string embedded in and required of every token.
pub const DEFAULT_ISSUER: &str = "ticket-system";

/// Token and session cache configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// HS256 signing secret.
    pub secret: Vec<u8>,

    /// Value of the `iss` claim.
    ///
    /// Default: `ticket-system`
    pub issuer: String,

    /// Access token lifetime.
    ///
    /// Default: 60 minutes
    pub access_ttl: Duration,

    /// Refresh token lifetime.
    ///
    /// Default: 24 hours
    pub refresh_ttl: Duration,

    /// Clock-skew tolerance applied to `exp` during verification.
    ///
    /// Default: 30 seconds
    pub leeway_secs: u64,

    /// TTL of the cached token version.
    ///
    /// Default: 1 hour. A zero TTL is treated as the default.
    pub cache_ttl: std::time::Duration,
}

impl TokenConfig {
    /// Create configuration with the given signing secret and defaults.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::hours(24),
            leeway_secs: 30,
            cache_ttl: std::time::Duration::from_secs(3600),
        }
    }

    /// Set the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the access token lifetime.
    #[must_use]
    pub const fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set the refresh token lifetime.
    #[must_use]
    pub const fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Set the verification leeway.
    #[must_use]
    pub const fn with_leeway_secs(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Set the cache TTL.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Cache TTL with the zero-means-default rule applied.
    #[must_use]
    pub const fn effective_cache_ttl(&self) -> std::time::Duration {
        if self.cache_ttl.is_zero() {
            std::time::Duration::from_secs(3600)
        } else {
            self.cache_ttl
        }
    }
}

// The secret never reaches logs.
impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway_secs", &self.leeway_secs)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
