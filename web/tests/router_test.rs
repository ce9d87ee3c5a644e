//! End-to-end router tests with in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use std::sync::Arc;
use ticket_auth::mocks::{MockSessionCache, MockTokenVersionStore};
use ticket_auth::{SessionService, TokenConfig, TokenPair, TokenService};
use ticket_core::{AccountId, Role, TokenVersion};
use ticket_notify::Hub;
use ticket_notify::mocks::MockConnection;
use ticket_runtime::InMemoryTaskQueue;
use ticket_web::{AppState, REQUEST_ID_HEADER, router};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    sessions: Arc<SessionService>,
    cache: MockSessionCache,
    store: MockTokenVersionStore,
    hub: Arc<Hub>,
    queue: InMemoryTaskQueue,
}

impl TestApp {
    fn new() -> Self {
        let cache = MockSessionCache::new();
        let store = MockTokenVersionStore::new()
            .with_account(AccountId::new(1), TokenVersion::initial())
            .with_account(AccountId::new(2), TokenVersion::initial())
            .with_account(AccountId::new(3), TokenVersion::initial());
        let tokens = TokenService::new(TokenConfig::new("router-test-secret")).unwrap();
        let sessions = Arc::new(SessionService::new(
            tokens,
            Arc::new(cache.clone()),
            Arc::new(store.clone()),
        ));
        let hub = Arc::new(Hub::new());
        let queue = InMemoryTaskQueue::new();

        let state = AppState::new(
            Arc::clone(&sessions),
            Arc::clone(&hub),
            Arc::new(queue.clone()),
        );

        Self {
            app: router(state),
            sessions,
            cache,
            store,
            hub,
            queue,
        }
    }

    async fn login(&self, id: u64, role: Role) -> TokenPair {
        self.sessions.issue(AccountId::new(id), role).await.unwrap()
    }

    async fn call(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let response = app.call(get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let response = app.call(get("/api/auth/me", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body, json!({"code": "UNAUTHORIZED", "message": "Unauthorized"}));
}

#[tokio::test]
async fn test_me_returns_claims() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::Organiser).await;

    let response = app
        .call(get("/api/auth/me", Some(&tokens.access_token)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["role"], "organiser");
    assert_eq!(body["version"], 0);
}

#[tokio::test]
async fn test_refresh_token_rejected_as_access_token() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;

    let response = app
        .call(get("/api/auth/me", Some(&tokens.refresh_token)))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;

    let response = app
        .call(post(
            "/api/auth/refresh",
            None,
            &json!({"refresh_token": tokens.refresh_token}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let access_token = json_body(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.call(get("/api/auth/me", Some(&access_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_with_access_token_is_unauthorized() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;

    let response = app
        .call(post(
            "/api/auth/refresh",
            None,
            &json!({"refresh_token": tokens.access_token}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_all_revokes_outstanding_tokens() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;

    let response = app
        .call(post(
            "/api/auth/logout-all",
            Some(&tokens.access_token),
            &json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .call(get("/api/auth/me", Some(&tokens.access_token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .call(post(
            "/api/auth/refresh",
            None,
            &json!({"refresh_token": tokens.refresh_token}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cache_outage_falls_back_to_store() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;
    app.cache.set_unavailable(true);

    let response = app
        .call(get("/api/auth/me", Some(&tokens.access_token)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.read_count() >= 1);
}

#[tokio::test]
async fn test_store_outage_is_internal_error_without_detail() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;
    app.cache.set_unavailable(true);
    app.store.set_unavailable(true);

    let response = app
        .call(get("/api/auth/me", Some(&tokens.access_token)))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_online_reflects_hub() {
    let app = TestApp::new();
    let tokens = app.login(1, Role::User).await;
    app.hub
        .subscribe(AccountId::new(2), Arc::new(MockConnection::new()))
        .await;

    let response = app
        .call(get(
            "/api/notifications/online/2",
            Some(&tokens.access_token),
        ))
        .await;
    assert_eq!(json_body(response).await, json!({"online": true}));

    let response = app
        .call(get(
            "/api/notifications/online/3",
            Some(&tokens.access_token),
        ))
        .await;
    assert_eq!(json_body(response).await, json!({"online": false}));
}

#[tokio::test]
async fn test_send_notification_requires_role() {
    let app = TestApp::new();
    let user = app.login(1, Role::User).await;
    let body = json!({"receiver_id": 2, "title": "Hi", "content": "There"});

    let response = app
        .call(post("/api/notifications", Some(&user.access_token), &body))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.queue.pending_len("default"), 0);
}

#[tokio::test]
async fn test_send_notification_enqueues_task() {
    let app = TestApp::new();
    let organiser = app.login(1, Role::Organiser).await;
    let body = json!({"receiver_id": 2, "title": "Hi", "content": "There"});

    let response = app
        .call(post(
            "/api/notifications",
            Some(&organiser.access_token),
            &body,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let task_id = json_body(response).await["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    let pending = app.queue.pending("default");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.to_string(), task_id);
    assert_eq!(pending[0].kind, "send-notification");
    assert_eq!(pending[0].payload["receiver_id"], 2);
    assert_eq!(pending[0].max_retry, 25);
}

#[tokio::test]
async fn test_send_notification_validates_title() {
    let app = TestApp::new();
    let admin = app.login(1, Role::Admin).await;
    let body = json!({"receiver_id": 2, "title": "  ", "content": "There"});

    let response = app
        .call(post("/api/notifications", Some(&admin.access_token), &body))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.queue.pending_len("default"), 0);
}

#[tokio::test]
async fn test_broadcast_is_admin_only_and_counts_deliveries() {
    let app = TestApp::new();
    let first = MockConnection::new();
    let second = MockConnection::new();
    app.hub
        .subscribe(AccountId::new(2), Arc::new(first.clone()))
        .await;
    app.hub
        .subscribe(AccountId::new(3), Arc::new(second.clone()))
        .await;
    let message = json!({"msg": "hi everyone"});

    let organiser = app.login(1, Role::Organiser).await;
    let response = app
        .call(post(
            "/api/notifications/broadcast",
            Some(&organiser.access_token),
            &message,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(first.sent().is_empty());

    let admin = app.login(1, Role::Admin).await;
    let response = app
        .call(post(
            "/api/notifications/broadcast",
            Some(&admin.access_token),
            &message,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"delivered": 2}));

    for connection in [first, second] {
        let sent = connection.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(serde_json::from_str::<Value>(&sent[0]).unwrap(), message);
    }
}

#[tokio::test]
async fn test_cors_headers_on_simple_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://tickets.example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await;

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
