//! Integration tests for the notification hub.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::sync::Arc;
use ticket_core::AccountId;
use ticket_notify::mocks::MockConnection;
use ticket_notify::{Connection, Hub, NotifyError};

fn register() -> (MockConnection, Arc<dyn Connection>) {
    let mock = MockConnection::new();
    let shared: Arc<dyn Connection> = Arc::new(mock.clone());
    (mock, shared)
}

#[tokio::test]
async fn test_two_connections_broadcast_then_unsubscribe() {
    ticket_testing::init_tracing();
    let hub = Hub::new();
    let (one, one_shared) = register();
    let (two, two_shared) = register();

    hub.subscribe(AccountId::new(1), Arc::clone(&one_shared)).await;
    hub.subscribe(AccountId::new(2), Arc::clone(&two_shared)).await;

    let delivered = hub.broadcast(&json!({"msg": "hi everyone"})).await.unwrap();
    assert_eq!(delivered, 2);

    for mock in [&one, &two] {
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        let received: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(received, json!({"msg": "hi everyone"}));
    }

    hub.unsubscribe(AccountId::new(1), &one_shared).await;
    hub.unsubscribe(AccountId::new(2), &two_shared).await;

    assert_eq!(hub.len(), 0);
    assert!(one.is_closed());
    assert!(two.is_closed());
}

#[tokio::test]
async fn test_after_unsubscribe_account_is_offline() {
    let hub = Hub::new();
    let (_, shared) = register();

    hub.subscribe(AccountId::new(7), Arc::clone(&shared)).await;
    assert!(hub.is_online(AccountId::new(7)));

    hub.unsubscribe(AccountId::new(7), &shared).await;

    assert!(!hub.is_online(AccountId::new(7)));
    assert_eq!(
        hub.publish(AccountId::new(7), &json!({"title": "x"})).await.unwrap_err(),
        NotifyError::RecipientNotRegistered(AccountId::new(7))
    );
}

#[tokio::test]
async fn test_broadcast_never_exceeds_registered() {
    let hub = Arc::new(Hub::new());
    let mut mocks = Vec::new();
    for id in 0..20u64 {
        let (mock, shared) = register();
        if id % 3 == 0 {
            mock.fail_sends(true);
        }
        hub.subscribe(AccountId::new(id), shared).await;
        mocks.push(mock);
    }

    let delivered = hub.broadcast(&json!("tick")).await.unwrap();

    assert!(delivered <= hub.len());
    assert_eq!(delivered, 13);
    for mock in &mocks {
        assert!(mock.sent().len() <= 1);
    }
}

#[tokio::test]
async fn test_publish_order_for_single_writer() {
    let hub = Hub::new();
    let (mock, shared) = register();
    hub.subscribe(AccountId::new(1), shared).await;

    for n in 0..5 {
        hub.publish(AccountId::new(1), &json!({"n": n})).await.unwrap();
    }

    let order: Vec<i64> = mock
        .sent()
        .iter()
        .map(|text| serde_json::from_str::<serde_json::Value>(text).unwrap()["n"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_concurrent_subscribe_from_many_tasks() {
    let hub = Arc::new(Hub::new());
    let mut tasks = Vec::new();
    for id in 0..50u64 {
        let hub = Arc::clone(&hub);
        tasks.push(tokio::spawn(async move {
            let shared: Arc<dyn Connection> = Arc::new(MockConnection::new());
            hub.subscribe(AccountId::new(id % 10), shared).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(hub.len(), 10);
}
