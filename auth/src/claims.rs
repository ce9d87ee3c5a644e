//! Session token claims.
//!
//! A token's payload is the registered JWT claims (`iss`, `sub`, `iat`,
//! `exp`) flattened together with the session claims (`id`, `role`,
//! `token_type`, `version`):
//!
//! ```json
//! {
//!   "iss": "ticket-system",
//!   "sub": "42",
//!   "iat": 1735689600,
//!   "exp": 1735693200,
//!   "id": 42,
//!   "role": "organiser",
//!   "token_type": "access-token",
//!   "version": 3
//! }
//! ```

use crate::error::TokenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ticket_core::{AccountId, Role, TokenVersion};

/// Kind of session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Short-lived token presented on every request.
    #[serde(rename = "access-token")]
    Access,
    /// Long-lived token exchanged for new access tokens.
    #[serde(rename = "refresh-token")]
    Refresh,
}

impl TokenKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access-token",
            Self::Refresh => "refresh-token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access-token" => Ok(Self::Access),
            "refresh-token" => Ok(Self::Refresh),
            other => Err(TokenError::InvalidTokenKind(other.to_string())),
        }
    }
}

/// Registered (standard) JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Issuer.
    pub iss: String,
    /// Subject: the account ID as a decimal string.
    pub sub: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expires at (seconds since epoch).
    pub exp: i64,
}

/// Verified session claims.
///
/// Only obtainable by issuing or verifying a token, so every value held by
/// the application has a known role, kind and issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Standard claims.
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    /// Account the token was issued to.
    pub id: AccountId,
    /// Role at issuance.
    pub role: Role,
    /// Access or refresh.
    pub token_type: TokenKind,
    /// Account token version at issuance.
    pub version: TokenVersion,
}

impl SessionClaims {
    /// Account ID.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.id
    }

    /// Role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Token kind.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.token_type
    }

    /// Embedded token version.
    #[must_use]
    pub const fn version(&self) -> TokenVersion {
        self.version
    }

    /// Issue time.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.registered.iat, 0)
    }

    /// Expiry time.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.registered.exp, 0)
    }
}

/// Claims as they come off the wire, before role and kind are checked.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    pub id: AccountId,
    pub role: String,
    pub token_type: String,
    pub version: TokenVersion,
}

impl TryFrom<RawClaims> for SessionClaims {
    type Error = TokenError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let token_type = raw.token_type.parse::<TokenKind>()?;
        let role = raw
            .role
            .parse::<Role>()
            .map_err(|_| TokenError::InvalidRole(raw.role.clone()))?;

        // `sub` and `id` are written together; disagreement means tampering.
        if raw.registered.sub != raw.id.to_string() {
            return Err(TokenError::MalformedToken);
        }

        Ok(Self {
            registered: raw.registered,
            id: raw.id,
            role,
            token_type,
            version: raw.version,
        })
    }
}
