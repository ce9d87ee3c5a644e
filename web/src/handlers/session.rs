//! Session management handlers.
//!
//! Token refresh, forced logout of every session, and the caller's claims.

use crate::error::AppError;
use crate::extractors::AuthClaims;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticket_core::{AccountId, Role, TokenVersion};

/// Request to exchange a refresh token for an access token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshRequest {
    /// Refresh token issued at login.
    pub refresh_token: String,
}

/// Fresh access token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshResponse {
    /// Access token with the same identity, role and version.
    pub access_token: String,
}

/// Summary of the caller's verified claims.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeResponse {
    /// Account ID.
    pub id: AccountId,
    /// Role at issuance.
    pub role: Role,
    /// Token version at issuance.
    pub version: TokenVersion,
    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Exchange a refresh token for a new access token.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/refresh
/// Content-Type: application/json
///
/// { "refresh_token": "eyJ..." }
/// ```
///
/// # Response
///
/// ```json
/// { "access_token": "eyJ..." }
/// ```
///
/// # Errors
///
/// 401 if the token is invalid, is not a refresh token, or has been revoked.
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let access_token = state.sessions.refresh(&request.refresh_token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// Revoke every outstanding token of the caller.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/logout-all
/// Authorization: Bearer <access token>
/// ```
///
/// Responds `204 No Content`.
///
/// # Errors
///
/// 500 if the version store is unavailable.
pub async fn logout_all(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<StatusCode, AppError> {
    let version = state.sessions.revoke_all(claims.account_id()).await?;
    tracing::info!(account_id = %claims.account_id(), %version, "All sessions revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Describe the caller.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/me
/// Authorization: Bearer <access token>
/// ```
#[allow(clippy::unused_async)]
pub async fn me(AuthClaims(claims): AuthClaims) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.account_id(),
        role: claims.role(),
        version: claims.version(),
        expires_at: claims.expires_at(),
    })
}
