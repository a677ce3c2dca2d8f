// Conversation store tests
// These tests verify the optimistic send bookkeeping: synchronous
// placeholder insertion, failure-in-place, the delivery status state
// machine, and ordering across reconciliation passes.

mod common;
use common::{assert_invariants, authoritative, base_time, placeholder_at, setup_logging};

use chrono::Duration;

use careline::models::{
    DeliveryStatus, Direction, MediaReference, MessageKind, MessageState,
};
use careline::store::ConversationStore;

#[test]
fn placeholder_insertion_is_immediate_and_ordered() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    store.apply_authoritative(&[authoritative(
        "srv-1",
        Direction::Incoming,
        MessageKind::Text,
        "hi",
        base_time(),
    )]);

    // Inserted with an earlier timestamp than the existing record
    let placeholder = placeholder_at(
        MessageKind::Text,
        "out of order",
        base_time() - Duration::seconds(30),
    );
    store.insert_placeholder(placeholder);

    assert_eq!(store.len(), 2);
    assert_eq!(store.messages()[0].text, "out of order");
    assert_invariants(store.messages());
}

#[test]
fn failed_send_is_kept_with_error() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let placeholder = placeholder_at(MessageKind::Text, "will fail", base_time());
    let client_id = placeholder.client_id.clone().unwrap();
    store.insert_placeholder(placeholder);

    assert!(store.mark_failed(&client_id, "backend returned 503"));

    // Never removed, error retained for a retry affordance
    assert_eq!(store.len(), 1);
    let failed = &store.messages()[0];
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.state, MessageState::Failed);
    assert!(failed
        .metadata
        .error
        .as_deref()
        .is_some_and(|e| !e.is_empty()));
}

#[test]
fn status_machine_is_enforced() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let placeholder = placeholder_at(MessageKind::Text, "hello", base_time());
    let id = placeholder.id.clone();
    store.insert_placeholder(placeholder);

    // sent -> delivered -> read
    assert!(store.mark_status(&id, DeliveryStatus::Delivered));
    assert!(store.mark_status(&id, DeliveryStatus::Read));

    // Backwards and repeated transitions are ignored
    assert!(!store.mark_status(&id, DeliveryStatus::Delivered));
    assert!(!store.mark_status(&id, DeliveryStatus::Sent));
    assert_eq!(store.find(&id).unwrap().status, DeliveryStatus::Read);
}

#[test]
fn failed_is_terminal() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let placeholder = placeholder_at(MessageKind::Text, "doomed", base_time());
    let id = placeholder.id.clone();
    store.insert_placeholder(placeholder);

    assert!(store.mark_failed(&id, "timeout"));
    assert!(!store.mark_status(&id, DeliveryStatus::Delivered));
    assert!(!store.mark_status(&id, DeliveryStatus::Read));
    assert_eq!(store.find(&id).unwrap().status, DeliveryStatus::Failed);
}

#[test]
fn failure_after_delivery_is_ignored() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let placeholder = placeholder_at(MessageKind::Text, "landed", base_time());
    let id = placeholder.id.clone();
    store.insert_placeholder(placeholder);

    assert!(store.mark_status(&id, DeliveryStatus::Delivered));
    assert!(!store.mark_failed(&id, "late timeout"));
    assert_eq!(store.find(&id).unwrap().status, DeliveryStatus::Delivered);
}

#[test]
fn upload_completion_updates_the_placeholder() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let mut placeholder = placeholder_at(MessageKind::Image, "scan", base_time());
    placeholder.metadata.uploading = true;
    let client_id = placeholder.client_id.clone().unwrap();
    store.insert_placeholder(placeholder);

    let media = MediaReference {
        id: Some("media-9".to_string()),
        url: Some("https://cdn.example.com/media-9".to_string()),
        filename: Some("scan.png".to_string()),
        mime_type: Some("image/png".to_string()),
    };
    assert!(store.complete_upload(&client_id, media));

    let message = store.find(&client_id).unwrap();
    assert!(!message.metadata.uploading);
    assert_eq!(
        message.metadata.media.as_ref().and_then(|m| m.id.as_deref()),
        Some("media-9")
    );
}

#[test]
fn passes_apply_in_arrival_order() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");

    // A newer page lands first, an older page second; the store still ends
    // up sorted because every pass restores the invariants.
    let newer = vec![
        authoritative(
            "srv-3",
            Direction::Incoming,
            MessageKind::Text,
            "third",
            base_time() + Duration::minutes(2),
        ),
        authoritative(
            "srv-4",
            Direction::Outgoing,
            MessageKind::Text,
            "fourth",
            base_time() + Duration::minutes(3),
        ),
    ];
    let older = vec![
        authoritative(
            "srv-1",
            Direction::Incoming,
            MessageKind::Text,
            "first",
            base_time(),
        ),
        authoritative(
            "srv-2",
            Direction::Outgoing,
            MessageKind::Text,
            "second",
            base_time() + Duration::minutes(1),
        ),
    ];

    store.apply_authoritative(&newer);
    store.apply_authoritative(&older);

    let texts: Vec<&str> = store.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third", "fourth"]);
    assert_invariants(store.messages());
}

#[test]
fn realtime_single_event_reconciles_placeholder() {
    setup_logging();

    let mut store = ConversationStore::new("contact-1");
    let placeholder = placeholder_at(MessageKind::Text, "Hello", base_time());
    let temp_id = placeholder.id.clone();
    store.insert_placeholder(placeholder);

    // The authoritative copy arrives alone over the real-time channel
    let confirmed = authoritative(
        "srv-1",
        Direction::Outgoing,
        MessageKind::Text,
        "Hello",
        base_time() + Duration::seconds(3),
    );
    store.apply_authoritative(std::slice::from_ref(&confirmed));

    assert_eq!(store.len(), 1);
    assert!(store.find(&temp_id).is_none());
    assert_eq!(store.find("srv-1").unwrap().state, MessageState::Confirmed);
}
