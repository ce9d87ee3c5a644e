//! Token Service: HS256 session token issuance and verification.
//!
//! Verification is stateless. It proves the token was signed by us, has not
//! expired (with leeway), names our issuer and carries a known role and
//! kind. Whether the token is still *current* is decided by
//! [`SessionService`](crate::session::SessionService) against the account's
//! token version.
//!
//! # Example
//!
//! ```
//! use ticket_auth::{TokenConfig, TokenKind, TokenService};
//! use ticket_core::{AccountId, Role, TokenVersion};
//!
//! # fn main() -> Result<(), ticket_auth::TokenError> {
//! let service = TokenService::new(TokenConfig::new("change-me"))?;
//! let token = service.create_token(AccountId::new(1), Role::User, TokenKind::Access, TokenVersion::initial())?;
//!
//! let claims = service.verify_token(&token)?;
//! assert_eq!(claims.account_id(), AccountId::new(1));
//! # Ok(())
//! # }
//! ```

use crate::claims::{RawClaims, RegisteredClaims, SessionClaims, TokenKind};
use crate::config::TokenConfig;
use crate::error::TokenError;
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;
use ticket_core::environment::{Clock, SystemClock};
use ticket_core::{AccountId, Role, TokenVersion};

/// The only algorithm tokens are signed with or accepted under.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSecret`] if the secret is empty.
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a token service with an injected clock for issuance times.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSecret`] if the secret is empty.
    pub fn with_clock(config: TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            config,
            clock,
        })
    }

    /// Lifetime of tokens of the given kind.
    #[must_use]
    pub const fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        }
    }

    /// The configuration this service was built with.
    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a token for the account.
    ///
    /// Expiry is `now + ttl_for(kind)`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn create_token(
        &self,
        account_id: AccountId,
        role: Role,
        kind: TokenKind,
        version: TokenVersion,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let expires_at = now + self.ttl_for(kind);

        let claims = SessionClaims {
            registered: RegisteredClaims {
                iss: self.config.issuer.clone(),
                sub: account_id.to_string(),
                iat: now.timestamp(),
                exp: expires_at.timestamp(),
            },
            id: account_id,
            role,
            token_type: kind,
            version,
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// Does not consult the account's current token version.
    ///
    /// # Errors
    ///
    /// - [`TokenError::MalformedToken`]: undecodable, missing claims
    /// - [`TokenError::UnexpectedAlgorithm`]: anything but HS256
    /// - [`TokenError::InvalidSignature`]: signed with another key
    /// - [`TokenError::Expired`]: past `exp` plus leeway
    /// - [`TokenError::InvalidIssuer`], [`TokenError::InvalidRole`],
    ///   [`TokenError::InvalidTokenKind`]: claim values outside the known sets
    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let data = jsonwebtoken::decode::<RawClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| map_jwt_error(e.kind()))?;

        let raw = data.claims;
        if raw.registered.iss != self.config.issuer {
            return Err(TokenError::InvalidIssuer(raw.registered.iss));
        }

        SessionClaims::try_from(raw)
    }
}

fn map_jwt_error(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm => TokenError::UnexpectedAlgorithm,
        _ => TokenError::MalformedToken,
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
