// Common test utilities for integration tests
// This module contains shared code for all integration tests

use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use log::LevelFilter;

use careline::models::{
    DeliveryStatus, Direction, Message, MessageKind, MessageMetadata, MessageState,
};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

/// Fixed reference instant so matching windows are deterministic
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

/// An outgoing placeholder pinned to a known timestamp
pub fn placeholder_at(kind: MessageKind, text: &str, at: DateTime<Utc>) -> Message {
    let mut message = Message::placeholder(kind, text);
    message.timestamp = at;
    message
}

/// An authoritative backend record with no echoed correlation id
pub fn authoritative(
    id: &str,
    direction: Direction,
    kind: MessageKind,
    text: &str,
    at: DateTime<Utc>,
) -> Message {
    Message {
        id: id.to_string(),
        client_id: None,
        direction,
        kind,
        text: text.to_string(),
        timestamp: at,
        status: DeliveryStatus::Delivered,
        state: MessageState::Confirmed,
        metadata: MessageMetadata::default(),
    }
}

/// Assert the two list invariants: unique by id, ascending timestamps
pub fn assert_invariants(messages: &[Message]) {
    let mut ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), messages.len(), "duplicate ids in {:?}", messages);

    for pair in messages.windows(2) {
        assert!(
            pair[0].timestamp <= pair[1].timestamp,
            "list not sorted: {} after {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
}
