//! Notification endpoints.
//!
//! Presence lookups, queued single-recipient notifications and immediate
//! broadcasts through the hub.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use ticket_core::AccountId;
use ticket_runtime::{NotificationPayload, Task, TaskQueue};
use uuid::Uuid;

/// Presence of one account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OnlineResponse {
    /// Whether the account has a live connection.
    pub online: bool,
}

/// Notification to deliver in the background.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendNotificationRequest {
    /// Recipient account.
    pub receiver_id: AccountId,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub content: String,
}

/// Accepted background task.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnqueuedResponse {
    /// ID of the enqueued task.
    pub task_id: Uuid,
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastResponse {
    /// Connections that accepted the message.
    pub delivered: usize,
}

/// Whether an account is connected.
///
/// # Endpoint
///
/// ```text
/// GET /api/notifications/online/{id}
/// ```
#[allow(clippy::unused_async)]
pub async fn online(State(state): State<AppState>, Path(id): Path<u64>) -> Json<OnlineResponse> {
    Json(OnlineResponse {
        online: state.hub.is_online(AccountId::new(id)),
    })
}

/// Queue a `send-notification` task.
///
/// Delivered in-app if the receiver is online when the task runs,
/// otherwise through the offline fallback.
///
/// # Endpoint
///
/// ```text
/// POST /api/notifications
/// Content-Type: application/json
///
/// { "receiver_id": 7, "title": "Order shipped", "content": "..." }
/// ```
///
/// Responds `202 Accepted` with `{ "task_id": "..." }`.
///
/// # Errors
///
/// - 422 if the title is blank
/// - 503 if the task queue is unavailable
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<EnqueuedResponse>), AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }

    let task = Task::SendNotification(NotificationPayload {
        receiver_id: request.receiver_id,
        title: request.title,
        content: request.content,
    });
    let task_id = state.queue.enqueue(&task, state.enqueue.clone()).await?;

    Ok((StatusCode::ACCEPTED, Json(EnqueuedResponse { task_id })))
}

/// Push a JSON message to every connected account now.
///
/// # Endpoint
///
/// ```text
/// POST /api/notifications/broadcast
/// Content-Type: application/json
///
/// { "msg": "Doors open in 10 minutes" }
/// ```
///
/// Responds with `{ "delivered": n }`.
pub async fn broadcast(
    State(state): State<AppState>,
    Json(message): Json<serde_json::Value>,
) -> Result<Json<BroadcastResponse>, AppError> {
    let delivered = state.hub.broadcast(&message).await?;
    Ok(Json(BroadcastResponse { delivered }))
}
