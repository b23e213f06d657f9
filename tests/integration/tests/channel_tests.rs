//! End-to-end channel tests over the local backend
//!
//! Run with: cargo test -p integration-tests --test channel_tests

use std::time::Duration;

use ephemera_core::{DomainError, Message, MessageType};
use integration_tests::{
    assert_completes, fixtures::*, next_message, read_all, TestNode, RECV_TIMEOUT,
};

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_create_then_fetch_is_empty() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    service.create_channel(&creds.name, &creds.password).await.unwrap();
    let messages = service
        .list_messages(&creds.name, &creds.password, 0, 10)
        .await
        .unwrap();

    assert!(messages.is_empty());
    assert!(service.channel_exists(&creds.name));
}

#[tokio::test]
async fn test_create_existing_conflicts() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    service.create_channel(&creds.name, &creds.password).await.unwrap();
    let err = service
        .create_channel(&creds.name, "another")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::AlreadyExists(_)));
    assert!(service.check_credentials(&creds.name, &creds.password));
}

#[tokio::test]
async fn test_wrong_password_leaves_channel_unchanged() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    service.send_text(&creds.name, &creds.password, "x").await.unwrap_err();
    service.create_channel(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "kept").await.unwrap();

    let err = service
        .list_messages(&creds.name, &creds.wrong_password(), 0, 10)
        .await
        .unwrap_err();
    assert!(err.is_credential());
    assert!(!err.is_not_found());

    let messages = service
        .list_messages(&creds.name, &creds.password, 0, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
}

// ============================================================================
// Messaging Tests
// ============================================================================

#[tokio::test]
async fn test_lobby_scenario() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let lobby = Credentials::lobby();

    service.create_channel(&lobby.name, &lobby.password).await.unwrap();
    service.send_text(&lobby.name, &lobby.password, "hi").await.unwrap();
    let id = service
        .send_file(&lobby.name, &lobby.password, "photo.png", upload(PHOTO_BYTES))
        .await
        .unwrap();

    let messages = service
        .list_messages(&lobby.name, &lobby.password, 0, 2)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageType::File);
    assert_eq!(messages[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(messages[1].kind, MessageType::Text);
    assert_eq!(messages[1].text.as_deref(), Some("hi"));

    // The storage location never leaves the service
    let rendered = format!("{:?}", messages[0]);
    assert!(!rendered.contains("ephemera-it"));

    assert!(service.check_credentials(&lobby.name, &lobby.password));
    assert!(!service.check_credentials(&lobby.name, &lobby.wrong_password()));

    let file = service
        .get_file(&lobby.name, &lobby.password, &id)
        .await
        .unwrap();
    assert_eq!(file.filename, "photo.png");
    assert_eq!(read_all(file).await.unwrap(), PHOTO_BYTES);
}

#[tokio::test]
async fn test_history_pages_newest_first() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();
    service.create_channel(&creds.name, &creds.password).await.unwrap();

    for i in 0..30 {
        service
            .send_text(&creds.name, &creds.password, &format!("m{i}"))
            .await
            .unwrap();
    }

    let recent = service
        .recent_messages(&creds.name, &creds.password)
        .await
        .unwrap();
    assert_eq!(recent.len(), 15);
    assert_eq!(recent[0].text.as_deref(), Some("m29"));
    assert_eq!(recent[14].text.as_deref(), Some("m15"));

    let older = service
        .list_messages(&creds.name, &creds.password, 15, 15)
        .await
        .unwrap();
    assert_eq!(older[0].text.as_deref(), Some("m14"));
    assert_eq!(older[14].text.as_deref(), Some("m0"));

    // Reading is repeatable
    let again = service
        .list_messages(&creds.name, &creds.password, 0, 30)
        .await
        .unwrap();
    assert_eq!(again.len(), 30);
    assert_eq!(&again[..15], &recent[..]);
}

#[tokio::test]
async fn test_subscriber_sees_only_later_messages() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();
    service.create_channel(&creds.name, &creds.password).await.unwrap();

    let mut early = service.listen(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "first").await.unwrap();

    let mut late = service.listen(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "second").await.unwrap();

    assert_eq!(next_message(&mut early, RECV_TIMEOUT).await, Some(Message::text("first")));
    assert_eq!(next_message(&mut early, RECV_TIMEOUT).await, Some(Message::text("second")));
    assert_eq!(next_message(&mut late, RECV_TIMEOUT).await, Some(Message::text("second")));

    // Nothing else arrives
    assert_eq!(next_message(&mut early, Duration::from_millis(100)).await, None);
}

#[tokio::test]
async fn test_closing_one_listener_leaves_others() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    let mut a = service.listen(&creds.name, &creds.password).await.unwrap();
    let mut b = service.listen(&creds.name, &creds.password).await.unwrap();
    a.close();

    service.send_text(&creds.name, &creds.password, "still here").await.unwrap();

    assert_completes(&mut a, RECV_TIMEOUT).await.unwrap();
    assert_eq!(next_message(&mut b, RECV_TIMEOUT).await, Some(Message::text("still here")));
}

#[tokio::test]
async fn test_concurrent_sends_each_appear_once() {
    let node = TestNode::start().await.expect("Failed to start node");
    let creds = Credentials::unique();
    node.service()
        .create_channel(&creds.name, &creds.password)
        .await
        .unwrap();

    let mut listener = node.service().listen(&creds.name, &creds.password).await.unwrap();

    let sends = (0..50).map(|i| {
        let service = node.service();
        let creds = creds.clone();
        async move {
            service
                .send_text(&creds.name, &creds.password, &format!("m{i}"))
                .await
        }
    });
    for result in futures::future::join_all(sends).await {
        result.unwrap();
    }

    let history = node
        .service()
        .list_messages(&creds.name, &creds.password, 0, 100)
        .await
        .unwrap();
    assert_eq!(history.len(), 50);

    // Live order matches history order, reversed
    let mut live = Vec::new();
    for _ in 0..50 {
        live.push(next_message(&mut listener, RECV_TIMEOUT).await.unwrap());
    }
    let live_texts: Vec<_> = live.iter().map(|m| m.to_dto().text).collect();
    let history_texts: Vec<_> = history.into_iter().rev().map(|m| m.text).collect();
    assert_eq!(live_texts, history_texts);
}

// ============================================================================
// Attachment Tests
// ============================================================================

#[tokio::test]
async fn test_file_requires_owning_channel_password() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();
    let other = Credentials::unique();
    service.create_channel(&creds.name, &creds.password).await.unwrap();
    service.create_channel(&other.name, &other.password).await.unwrap();

    let id = service
        .send_file(&creds.name, &creds.password, "notes.txt", upload(b"secret"))
        .await
        .unwrap();

    assert!(matches!(
        service.get_file(&creds.name, &creds.wrong_password(), &id).await,
        Err(DomainError::CredentialMismatch)
    ));
    assert!(matches!(
        service.get_file(&other.name, &other.password, &id).await,
        Err(DomainError::AttachmentNotFound(_))
    ));
    assert!(matches!(
        service.get_file(&creds.name, &creds.password, "../../etc/passwd").await,
        Err(DomainError::AttachmentNotFound(_))
    ));
}

#[tokio::test]
async fn test_file_to_missing_channel_fails() {
    let node = TestNode::start().await.expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    let err = service
        .send_file(&creds.name, &creds.password, "a.txt", upload(b"a"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ChannelNotFound(_)));
}

// ============================================================================
// Expiry Tests
// ============================================================================

#[tokio::test]
async fn test_expiry_destroys_channel_and_resources() {
    let node = TestNode::start_with_ttl(Duration::from_millis(500)).expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    let mut listener = service.listen(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "hi").await.unwrap();
    let id = service
        .send_file(&creds.name, &creds.password, "photo.png", upload(PHOTO_BYTES))
        .await
        .unwrap();

    assert_completes(&mut listener, Duration::from_secs(5)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!service.channel_exists(&creds.name));
    assert!(matches!(
        node.ctx().files().read(&id).await,
        Err(DomainError::AttachmentNotFound(_))
    ));
    assert!(matches!(
        service.get_file(&creds.name, &creds.password, &id).await,
        Err(DomainError::AttachmentNotFound(_))
    ));

    // Sending to an expired channel is the same as sending to an unknown one
    assert!(matches!(
        service.send_text(&creds.name, &creds.password, "late").await,
        Err(DomainError::ChannelNotFound(_))
    ));
}

#[tokio::test]
async fn test_expired_name_can_be_reclaimed() {
    let node = TestNode::start_with_ttl(Duration::from_millis(300)).expect("Failed to start node");
    let service = node.service();
    let creds = Credentials::unique();

    service.create_channel(&creds.name, &creds.password).await.unwrap();
    service.send_text(&creds.name, &creds.password, "old").await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    service.create_channel(&creds.name, "fresh").await.unwrap();
    assert!(!service.check_credentials(&creds.name, &creds.password));
    assert!(service
        .list_messages(&creds.name, "fresh", 0, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_channels_expire_independently() {
    let node = TestNode::start_with_ttl(Duration::from_millis(600)).expect("Failed to start node");
    let service = node.service();
    let first = Credentials::unique();
    let second = Credentials::unique();

    service.create_channel(&first.name, &first.password).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    service.create_channel(&second.name, &second.password).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!service.channel_exists(&first.name));
    assert!(service.channel_exists(&second.name));
}
