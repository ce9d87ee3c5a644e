//! Router composition.

use crate::handlers::{health, notifications, session, websocket};
use crate::middleware::{
    cors_layer, propagate_request_id_layer, require_auth, require_roles, set_request_id_layer,
    trace_layer,
};
use crate::state::AppState;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};
use ticket_core::Role;
use tower::ServiceBuilder;

/// Roles allowed to queue notifications for other accounts.
pub const NOTIFY_ROLES: &[Role] = &[Role::Admin, Role::Organiser];

/// Roles allowed to broadcast.
pub const BROADCAST_ROLES: &[Role] = &[Role::Admin];

/// Build the application router.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness probe
/// - `POST /api/auth/refresh` - Exchange a refresh token
///
/// ## Authenticated
/// - `POST /api/auth/logout-all` - Revoke every session of the caller
/// - `GET /api/auth/me` - Caller's claims
/// - `GET /api/ws` - Notification WebSocket
/// - `GET /api/notifications/online/{id}` - Presence
///
/// ## Admin / organiser
/// - `POST /api/notifications` - Queue a notification
///
/// ## Admin
/// - `POST /api/notifications/broadcast` - Push to everyone now
///
/// # Example
///
/// ```rust,ignore
/// let app = ticket_web::router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// ```
pub fn router(state: AppState) -> Router {
    let notify = Router::new()
        .route("/api/notifications", post(notifications::send))
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            require_roles(NOTIFY_ROLES, request, next)
        }));

    let broadcast = Router::new()
        .route("/api/notifications/broadcast", post(notifications::broadcast))
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            require_roles(BROADCAST_ROLES, request, next)
        }));

    let authenticated = Router::new()
        .route("/api/auth/logout-all", post(session::logout_all))
        .route("/api/auth/me", get(session::me))
        .route("/api/ws", get(websocket::handle))
        .route("/api/notifications/online/:id", get(notifications::online))
        .merge(notify)
        .merge(broadcast)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/refresh", post(session::refresh));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(trace_layer())
                .layer(propagate_request_id_layer())
                .layer(cors_layer()),
        )
        .with_state(state)
}
