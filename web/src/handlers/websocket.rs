//! WebSocket endpoint for realtime notifications.
//!
//! # Architecture
//!
//! ```text
//! Client          WebSocket Handler             Hub
//!   │                    │                       │
//!   ├─ Upgrade ─────────>│ (authenticated)       │
//!   │                    ├─ subscribe(id) ──────>│
//!   │                    │                       │
//!   │<─ JSON text ───────┼───── publish/broadcast┤
//!   │                    │                       │
//!   ├─ Close ───────────>│                       │
//!   │                    ├─ unsubscribe(id) ────>│
//! ```
//!
//! The channel is push-only: the server sends whatever JSON the publisher
//! supplied, without an envelope. Client text frames are ignored.

use crate::extractors::AuthClaims;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use ticket_core::AccountId;
use ticket_notify::{Connection, ConnectionError, ConnectionId, Hub};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

/// Hub connection over the write half of a WebSocket.
///
/// Writers are serialized by an async mutex, so concurrent publishes to the
/// same account never interleave frames.
pub struct WsConnection<S> {
    id: ConnectionId,
    sink: Mutex<S>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl<S> WsConnection<S> {
    /// Wrap a message sink.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            id: ConnectionId::new(),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    /// Whether [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection is closed from the server side.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_signal.notified().await;
    }
}

impl<S> fmt::Debug for WsConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: Sink<Message> + Send + Unpin + 'static,
    S::Error: fmt::Display,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    // The flag and signal are set before any I/O, so the read loop ends even
    // if the caller gives up on a stalled close frame.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close_signal.notify_one();

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(connection = %self.id, error = %e, "Close frame not sent");
        }
        if let Err(e) = sink.close().await {
            debug!(connection = %self.id, error = %e, "Sink close failed");
        }
    }
}

/// Upgrade an authenticated request to a notification socket.
///
/// # Endpoint
///
/// ```text
/// GET /api/ws
/// Authorization: Bearer <access token>
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Response {
    let account_id = claims.account_id();
    debug!(%account_id, "WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, account_id))
}

/// Register the socket with the hub and hold it until either side closes.
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, account_id: AccountId) {
    let (sender, mut receiver) = socket.split();

    let connection = Arc::new(WsConnection::new(sender));
    let registered: Arc<dyn Connection> = Arc::clone(&connection) as Arc<dyn Connection>;
    hub.subscribe(account_id, Arc::clone(&registered)).await;
    info!(%account_id, connection = %connection.id, "WebSocket connection established");

    loop {
        tokio::select! {
            () = connection.closed() => {
                debug!(%account_id, "Connection closed by server");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%account_id, "Client closed connection");
                    break;
                }
                Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                    debug!(%account_id, "Ignoring client message");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    warn!(%account_id, error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    hub.unsubscribe(account_id, &registered).await;
    info!(%account_id, "WebSocket connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use ticket_notify::HubConfig;

    /// A client that never drains its socket.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), Infallible> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_send_writes_text_frames_in_order() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let connection = WsConnection::new(tx);

        connection.send(r#"{"n":1}"#).await.unwrap();
        connection.send(r#"{"n":2}"#).await.unwrap();

        assert!(matches!(rx.next().await, Some(Message::Text(t)) if t == r#"{"n":1}"#));
        assert!(matches!(rx.next().await, Some(Message::Text(t)) if t == r#"{"n":2}"#));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_sends() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let connection = WsConnection::new(tx);

        connection.close().await;
        connection.close().await;
        connection.closed().await;

        assert!(connection.is_closed());
        assert!(matches!(rx.next().await, Some(Message::Close(None))));
        assert!(rx.next().await.is_none());
        assert_eq!(
            connection.send("late").await.unwrap_err(),
            ConnectionError::Closed
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);
        let connection = WsConnection::new(tx);

        let err = connection.send("hello").await.unwrap_err();
        assert!(matches!(err, ConnectionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_hub_replacement_closes_previous_socket() {
        let hub = Hub::new();
        let (tx1, _rx1) = mpsc::unbounded::<Message>();
        let (tx2, _rx2) = mpsc::unbounded::<Message>();
        let first = Arc::new(WsConnection::new(tx1));
        let second = Arc::new(WsConnection::new(tx2));

        hub.subscribe(AccountId::new(1), Arc::clone(&first) as Arc<dyn Connection>)
            .await;
        hub.subscribe(AccountId::new(1), Arc::clone(&second) as Arc<dyn Connection>)
            .await;

        first.closed().await;
        assert!(!second.is_closed());
        assert!(hub.is_online(AccountId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_stalled_socket_does_not_block_new_device() {
        let hub = Hub::with_config(
            HubConfig::default().with_write_timeout(Duration::from_millis(100)),
        );
        let stalled = Arc::new(WsConnection::new(StalledSink));
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let fresh = Arc::new(WsConnection::new(tx));

        hub.subscribe(AccountId::new(1), Arc::clone(&stalled) as Arc<dyn Connection>)
            .await;
        tokio::time::timeout(
            Duration::from_secs(3),
            hub.subscribe(AccountId::new(1), Arc::clone(&fresh) as Arc<dyn Connection>),
        )
        .await
        .expect("new device blocked by the stalled socket");

        // The stalled socket's read loop is released even though its close
        // frame never went out.
        tokio::time::timeout(Duration::from_secs(1), stalled.closed())
            .await
            .expect("stalled socket never signalled close");

        hub.publish_text(AccountId::new(1), "hi").await.unwrap();
        assert!(matches!(rx.next().await, Some(Message::Text(t)) if t == "hi"));
    }
}
