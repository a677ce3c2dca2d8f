use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CRM contact reachable over the messaging channel.
///
/// `window_expires_at` is the backend-defined conversation window for this
/// contact. It is carried for display only and never computed client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub window_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Discriminator for the message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Template,
    Interactive,
}

impl MessageKind {
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageKind::Image | MessageKind::Video | MessageKind::Audio | MessageKind::Document
        )
    }

    /// Resolve a media kind from a MIME type, falling back to Document.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MessageKind::Image
        } else if mime.starts_with("video/") {
            MessageKind::Video
        } else if mime.starts_with("audio/") {
            MessageKind::Audio
        } else {
            MessageKind::Document
        }
    }
}

/// Client-local delivery lifecycle for outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,      // Optimistically inserted, not yet acknowledged
    Delivered, // Acknowledged by the backend
    Read,      // Read confirmation received
    Failed,    // Send failed; terminal
}

impl DeliveryStatus {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Allowed: Sent -> Delivered, Sent -> Failed, Delivered -> Read.
    /// Failed is terminal and nothing moves backwards.
    pub fn may_become(&self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::Sent, DeliveryStatus::Delivered)
                | (DeliveryStatus::Sent, DeliveryStatus::Failed)
                | (DeliveryStatus::Delivered, DeliveryStatus::Read)
        )
    }
}

/// Provenance of a message record in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    /// Local placeholder inserted at send time, awaiting the authoritative record.
    Pending,
    /// Authoritative record received from the backend.
    Confirmed,
    /// Send failed; the record is kept with the error attached.
    Failed,
}

/// Reference to an uploaded media object, as returned by the media endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaReference {
    pub id: Option<String>,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

/// Open attributes carried alongside a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub media: Option<MediaReference>,
    pub uploading: bool,
    pub error: Option<String>,
    pub template_name: Option<String>,
}

/// A single message in a conversation, local placeholder or authoritative record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Server UID once confirmed; equals the correlation id while pending.
    pub id: String,
    /// Correlation id generated at send time and passed through to the
    /// backend, echoed back on the authoritative record when supported.
    pub client_id: Option<String>,
    pub direction: Direction,
    pub kind: MessageKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub state: MessageState,
    pub metadata: MessageMetadata,
}

impl Message {
    /// Build an outgoing placeholder with a fresh correlation id.
    pub fn placeholder(kind: MessageKind, text: impl Into<String>) -> Self {
        let client_id = uuid::Uuid::new_v4().to_string();
        Message {
            id: client_id.clone(),
            client_id: Some(client_id),
            direction: Direction::Outgoing,
            kind,
            text: text.into(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Sent,
            state: MessageState::Pending,
            metadata: MessageMetadata::default(),
        }
    }

    /// Mark this record as a failed send, keeping it in place.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = DeliveryStatus::Failed;
        self.state = MessageState::Failed;
        self.metadata.error = Some(error.into());
        self.metadata.uploading = false;
    }

    pub fn is_pending(&self) -> bool {
        self.state == MessageState::Pending
    }
}

/// A pre-approved outbound message template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub name: String,
    pub language: String,
    pub category: String,
    pub body: String,
}

/// A bookable appointment type, scoped to the tenant server-side.
///
/// `base_consultation_fee` is a decimal carried as a string; it is money and
/// never goes through a float.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_default: u32,
    pub base_consultation_fee: String,
    pub is_active: bool,
    pub color: String,
}
