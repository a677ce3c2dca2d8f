// Re-export needed modules for testing
pub mod api;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod timestamp;

// Re-export main types for convenience
pub use api::{ClientError, ClientEvent, CrmClient};
pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_contact_window_reference() {
        let expiring = Contact {
            id: "c1".to_string(),
            name: "Asha Rao".to_string(),
            phone: "+919800000001".to_string(),
            window_expires_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()),
        };
        let closed = Contact {
            id: "c2".to_string(),
            name: "Vikram Shah".to_string(),
            phone: "+919800000002".to_string(),
            window_expires_at: None,
        };

        assert_eq!(expiring.id, "c1");
        assert!(expiring.window_expires_at.is_some());
        assert!(closed.window_expires_at.is_none());
    }

    #[test]
    fn test_placeholder_creation() {
        let msg = Message::placeholder(MessageKind::Text, "Hello, world!");

        assert_eq!(msg.text, "Hello, world!");
        assert_eq!(msg.direction, Direction::Outgoing);
        assert_eq!(msg.status, DeliveryStatus::Sent);
        assert_eq!(msg.state, MessageState::Pending);
        // The temporary id is the correlation id until confirmation
        assert_eq!(Some(msg.id.clone()), msg.client_id);
        assert!(msg.metadata.error.is_none());
    }

    #[test]
    fn test_delivery_status_transitions() {
        assert!(DeliveryStatus::Sent.may_become(DeliveryStatus::Delivered));
        assert!(DeliveryStatus::Sent.may_become(DeliveryStatus::Failed));
        assert!(DeliveryStatus::Delivered.may_become(DeliveryStatus::Read));

        // Failed is terminal
        assert!(!DeliveryStatus::Failed.may_become(DeliveryStatus::Sent));
        assert!(!DeliveryStatus::Failed.may_become(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Failed.may_become(DeliveryStatus::Read));

        // Nothing moves backwards
        assert!(!DeliveryStatus::Delivered.may_become(DeliveryStatus::Sent));
        assert!(!DeliveryStatus::Read.may_become(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Sent.may_become(DeliveryStatus::Read));
    }

    #[test]
    fn test_mark_failed_keeps_error() {
        let mut msg = Message::placeholder(MessageKind::Text, "will fail");
        msg.mark_failed("backend returned 503");

        assert_eq!(msg.status, DeliveryStatus::Failed);
        assert_eq!(msg.state, MessageState::Failed);
        assert_eq!(msg.metadata.error.as_deref(), Some("backend returned 503"));
    }

    #[test]
    fn test_media_kind_resolution() {
        assert_eq!(MessageKind::from_mime("image/jpeg"), MessageKind::Image);
        assert_eq!(MessageKind::from_mime("VIDEO/mp4"), MessageKind::Video);
        assert_eq!(MessageKind::from_mime("audio/ogg"), MessageKind::Audio);
        assert_eq!(MessageKind::from_mime("application/pdf"), MessageKind::Document);

        assert!(MessageKind::Image.is_media());
        assert!(!MessageKind::Text.is_media());
        assert!(!MessageKind::Template.is_media());
    }
}
