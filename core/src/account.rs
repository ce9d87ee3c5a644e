//! Account identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing account vocabulary from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The value is not a valid account ID.
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    /// The value is not one of the known roles.
    #[error("invalid role: {0}")]
    UnknownRole(String),

    /// The value is not a valid token version.
    #[error("invalid token version: {0}")]
    InvalidTokenVersion(String),
}

/// Numeric account identifier.
///
/// Serialized as a bare number; rendered as its decimal string when used as a
/// cache key or JWT subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Create an account ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseError::InvalidAccountId(s.to_string()))
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Account role.
///
/// The set is closed: anything else is rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform administrator.
    Admin,
    /// Event organiser.
    Organiser,
    /// Support staff.
    Staff,
    /// Regular ticket buyer.
    User,
}

impl Role {
    /// All roles, in privilege order.
    pub const ALL: [Self; 4] = [Self::Admin, Self::Organiser, Self::Staff, Self::User];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Organiser => "organiser",
            Self::Staff => "staff",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "organiser" => Ok(Self::Organiser),
            "staff" => Ok(Self::Staff),
            "user" => Ok(Self::User),
            other => Err(ParseError::UnknownRole(other.to_string())),
        }
    }
}

/// Per-account session generation counter.
///
/// A token is only valid while its embedded version equals the account's
/// current version. Bumping the counter invalidates every issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenVersion(pub i64);

impl TokenVersion {
    /// Create a token version.
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(version)
    }

    /// Version assigned to new accounts.
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// The version after one invalidation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The raw counter.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TokenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ParseError::InvalidTokenVersion(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_role_wire_names() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(ParseError::UnknownRole("superuser".to_string()))
        );
        assert!(serde_json::from_str::<Role>("\"Admin\"").is_err());
    }

    #[test]
    fn test_account_id_parsing() {
        assert_eq!("17".parse::<AccountId>().unwrap(), AccountId::new(17));
        assert_eq!(" 17 ".parse::<AccountId>().unwrap(), AccountId::new(17));
        assert!("-1".parse::<AccountId>().is_err());
        assert!("abc".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_token_version_next() {
        assert_eq!(TokenVersion::initial(), TokenVersion::new(0));
        assert_eq!(TokenVersion::new(4).next(), TokenVersion::new(5));
        assert_eq!(TokenVersion::new(i64::MAX).next(), TokenVersion::new(i64::MAX));
    }

    #[test]
    fn test_token_version_rejects_garbage() {
        assert!("eyJhbGciOiJIUzI1NiJ9".parse::<TokenVersion>().is_err());
        assert_eq!("3".parse::<TokenVersion>().unwrap(), TokenVersion::new(3));
    }

    proptest! {
        #[test]
        fn prop_account_id_display_parses_back(id in any::<u64>()) {
            let account = AccountId::new(id);
            prop_assert_eq!(account.to_string().parse::<AccountId>().unwrap(), account);
        }

        #[test]
        fn prop_token_version_display_parses_back(v in any::<i64>()) {
            let version = TokenVersion::new(v);
            prop_assert_eq!(version.to_string().parse::<TokenVersion>().unwrap(), version);
        }
    }
}
