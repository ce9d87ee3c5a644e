//! Custom Axum extractors.
//!
//! - `BearerToken`: the raw token from the `Authorization` header
//! - `AuthClaims`: the verified claims attached by [`require_auth`]
//!
//! [`require_auth`]: crate::middleware::require_auth
//!
//! # Examples
//!
//! ```ignore
//! use ticket_web::extractors::AuthClaims;
//!
//! async fn handler(AuthClaims(claims): AuthClaims) -> String {
//!     format!("Hello, account {}", claims.account_id())
//! }
//! ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use std::convert::Infallible;
use ticket_auth::SessionClaims;

use crate::error::AppError;

/// Token from `Authorization: Bearer <token>`.
///
/// Always extracts; an absent header or scheme yields an empty string, which
/// authentication rejects as a missing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_token(&parts.headers)))
    }
}

/// Strip the `Bearer` scheme and surrounding whitespace.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> String {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    value
        .trim()
        .strip_prefix("Bearer")
        .unwrap_or(value)
        .trim()
        .to_string()
}

/// Claims of the authenticated caller.
///
/// Only available behind [`require_auth`](crate::middleware::require_auth);
/// elsewhere extraction fails with 401.
#[derive(Debug, Clone)]
pub struct AuthClaims(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionClaims>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Unauthorized"))
    }
}
