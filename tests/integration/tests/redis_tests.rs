//! Channel tests over the Redis backend
//!
//! These tests require:
//! - Running Redis instance
//! - Environment variable: REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test redis_tests

use std::time::Duration;

use ephemera_core::{DomainError, Message, MessageType};
use integration_tests::{
    assert_completes, check_redis_env, fixtures::*, next_message, read_all, redis_config,
    TestNode, RECV_TIMEOUT,
};

#[tokio::test]
async fn test_redis_send_and_list() {
    let Some(url) = check_redis_env() else {
        return;
    };

    let node = TestNode::start_with_config(redis_config(&url, Duration::from_secs(60)))
        .await
        .expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    service.create_channel(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "hi").await.unwrap();
    let id = service
        .send_file(&creds.name, &creds.password, "photo.png", upload(PHOTO_BYTES))
        .await
        .unwrap();

    let messages = service
        .list_messages(&creds.name, &creds.password, 0, 2)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageType::File);
    assert_eq!(messages[1].text.as_deref(), Some("hi"));

    let file = service
        .get_file(&creds.name, &creds.password, &id)
        .await
        .unwrap();
    assert_eq!(read_all(file).await.unwrap(), PHOTO_BYTES);
    assert!(matches!(
        service.get_file(&creds.name, &creds.wrong_password(), &id).await,
        Err(DomainError::CredentialMismatch)
    ));

    node.ctx().registry().destroy_now(&creds.name).await;
}

#[tokio::test]
async fn test_redis_fanout_reaches_every_listener() {
    let Some(url) = check_redis_env() else {
        return;
    };

    let node = TestNode::start_with_config(redis_config(&url, Duration::from_secs(60)))
        .await
        .expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    let mut a = service.listen(&creds.name, &creds.password).await.unwrap();
    let mut b = service.listen(&creds.name, &creds.password).await.unwrap();

    service.send_text(&creds.name, &creds.password, "one").await.unwrap();
    service.send_text(&creds.name, &creds.password, "two").await.unwrap();

    for listener in [&mut a, &mut b] {
        assert_eq!(next_message(listener, RECV_TIMEOUT).await, Some(Message::text("one")));
        assert_eq!(next_message(listener, RECV_TIMEOUT).await, Some(Message::text("two")));
    }

    a.close();
    assert_completes(&mut a, RECV_TIMEOUT).await.unwrap();

    service.send_text(&creds.name, &creds.password, "three").await.unwrap();
    assert_eq!(next_message(&mut b, RECV_TIMEOUT).await, Some(Message::text("three")));

    node.ctx().registry().destroy_now(&creds.name).await;
}

#[tokio::test]
async fn test_redis_two_nodes_share_messages() {
    let Some(url) = check_redis_env() else {
        return;
    };

    let first = TestNode::start_with_config(redis_config(&url, Duration::from_secs(60)))
        .await
        .expect("Failed to start node");
    let second = TestNode::start_with_config(redis_config(&url, Duration::from_secs(60)))
        .await
        .expect("Failed to start node");
    let creds = Credentials::unique();

    let mut listener = second
        .service()
        .listen(&creds.name, &creds.password)
        .await
        .unwrap();

    first
        .service()
        .create_channel(&creds.name, &creds.password)
        .await
        .unwrap();
    first
        .service()
        .send_text(&creds.name, &creds.password, "across")
        .await
        .unwrap();

    assert_eq!(
        next_message(&mut listener, RECV_TIMEOUT).await,
        Some(Message::text("across"))
    );

    let history = second
        .service()
        .list_messages(&creds.name, &creds.password, 0, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    first.ctx().registry().destroy_now(&creds.name).await;
    second.ctx().registry().destroy_now(&creds.name).await;
}

#[tokio::test]
async fn test_redis_expiry_clears_history() {
    let Some(url) = check_redis_env() else {
        return;
    };

    let node = TestNode::start_with_config(redis_config(&url, Duration::from_secs(1)))
        .await
        .expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    let mut listener = service.listen(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "hi").await.unwrap();

    assert_completes(&mut listener, Duration::from_secs(5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!service.channel_exists(&creds.name));
    assert!(node
        .ctx()
        .history()
        .range(&creds.name, 0, 10)
        .await
        .unwrap()
        .is_empty());
}
