//! Axum middleware for authentication, authorization and request tracking.
//!
//! # Flow
//!
//! ```text
//! request ──> x-request-id ──> trace span ──> CORS ──> require_auth ──> require_roles ──> handler
//!                                                         │                 │
//!                                                      401/500             403
//! ```
//!
//! [`require_auth`] verifies the bearer token, checks its version against
//! the account's current version and stores the [`SessionClaims`] in the
//! request extensions. [`require_roles`] then admits only the listed roles.

use crate::error::AppError;
use crate::extractors::bearer_token;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderName, Method, header},
    middleware::Next,
    response::Response,
};
use std::time::Duration;
use ticket_auth::{SessionClaims, SessionService};
use ticket_core::Role;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{MakeSpan, TraceLayer},
};

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticate the request and attach its claims.
///
/// Install with `axum::middleware::from_fn_with_state`.
///
/// # Errors
///
/// - 401 for a missing, invalid, refresh or stale token
/// - 500 when the token version cannot be resolved
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers());
    let claims = state.sessions.authenticate(&token).await?;

    tracing::Span::current().record("account_id", claims.account_id().get());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Admit only callers whose role is in `allowed`.
///
/// Must run after [`require_auth`]. Install with a closure:
///
/// ```ignore
/// .route_layer(middleware::from_fn(|req, next| require_roles(&[Role::Admin], req, next)))
/// ```
///
/// # Errors
///
/// - 401 if no claims are attached
/// - 403 if the role is not allowed
pub async fn require_roles(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = request
        .extensions()
        .get::<SessionClaims>()
        .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

    SessionService::authorize(claims, allowed)?;
    Ok(next.run(request).await)
}

/// CORS policy: any origin, the usual verbs, and the headers browsers send
/// with authenticated JSON requests.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Generate an `x-request-id` when the client sent none.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copy `x-request-id` onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Span per request carrying method, path and request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri().path(),
            request_id = %request_id,
            account_id = tracing::field::Empty,
        )
    }
}

/// Request tracing layer using [`RequestSpan`].
#[must_use]
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceBuilder;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route("/test", get(|| async { "ok" })).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(trace_layer())
                .layer(propagate_request_id_layer())
                .layer(cors_layer()),
        )
    }

    #[tokio::test]
    async fn test_request_id_generated_if_missing() {
        let request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("Request ID header should be present");
        assert!(uuid::Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_preserved_from_request() {
        let request = Request::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, "req-123")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req-123"
        );
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/test")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
        let methods = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(methods.contains("DELETE"));
    }
}
