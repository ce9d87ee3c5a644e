//! Error types for token, session and revocation operations.

use crate::claims::TokenKind;
use thiserror::Error;
use ticket_core::AccountId;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures of the stateless token layer (signing and verification).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token could not be parsed (bad encoding, missing claims, bad JSON).
    #[error("Malformed token")]
    MalformedToken,

    /// The signature does not match the signing key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The header names an algorithm other than HS256 (including `none`).
    #[error("Unexpected signing algorithm")]
    UnexpectedAlgorithm,

    /// The token expired (beyond the verification leeway).
    #[error("Token has expired")]
    Expired,

    /// The `iss` claim is not this service.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// The `token_type` claim is neither access nor refresh.
    #[error("Invalid token kind: {0}")]
    InvalidTokenKind(String),

    /// The `role` claim is not a known role.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// No signing secret was configured.
    #[error("Signing secret is empty")]
    MissingSecret,

    /// The signer rejected the claims.
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Session cache failures. Always recoverable through the durable store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache could not be reached or answered with an error.
    #[error("Session cache unavailable: {0}")]
    Unavailable(String),
}

/// Durable token-version store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No account row with this ID.
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    /// Query or connection failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request-level authentication and authorization failures.
///
/// These are the terminal `Rejected(..)` states of the request pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("Missing bearer token")]
    MissingToken,

    /// The token failed stateless verification.
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// A valid token of the wrong kind (refresh used for a request, or
    /// access used to refresh).
    #[error("Expected a {expected} token")]
    WrongTokenKind {
        /// The kind the operation requires
        expected: TokenKind,
    },

    /// The token's version is behind the account's current version.
    #[error("Token version does not match")]
    StaleToken,

    /// The token names an account that no longer exists.
    #[error("Unknown account {0}")]
    UnknownAccount(AccountId),

    /// Authenticated, but the role is not allowed here.
    #[error("Insufficient permissions: {required}")]
    Forbidden {
        /// Roles that would have been accepted
        required: String,
    },

    /// Infrastructure failure with no further fallback.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if the caller should see a 401.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticket_auth::AuthError;
    /// assert!(AuthError::StaleToken.is_unauthorized());
    /// assert!(!AuthError::Internal("db down".into()).is_unauthorized());
    /// ```
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MissingToken
                | Self::InvalidToken(_)
                | Self::WrongTokenKind { .. }
                | Self::StaleToken
                | Self::UnknownAccount(_)
        )
    }

    /// Returns `true` for infrastructure failures (500-class).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => Self::UnknownAccount(id),
            StoreError::Database(message) => Self::Internal(message),
        }
    }
}
