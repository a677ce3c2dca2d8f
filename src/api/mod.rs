// CRM backend client module.
// This file is the entry point for everything that talks to the backend:
// REST wrappers, the real-time event loop, and the event channel consumed
// by the view layer.

use log::{debug, error};
use reqwest::RequestBuilder;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use url::Url;

pub mod appointments;
pub mod connection;
pub mod contacts;
pub mod media;
pub mod messages;
pub mod realtime;
pub mod templates;

pub use connection::ClientState;
pub use messages::{HistoryQueryOptions, HistoryQueryResult};

use crate::models::{Contact, DeliveryStatus, Message};
use crate::store::ConversationStore;

/// Backend endpoint paths, relative to the configured base URL.
pub mod endpoints {
    pub const ME: &str = "/api/v1/me";
    pub const CONTACTS: &str = "/api/v1/contacts";
    pub const CONTACT_LOOKUP: &str = "/api/v1/contacts/lookup";
    pub const CONVERSATIONS: &str = "/api/v1/conversations";
    pub const SEND_TEXT: &str = "/api/v1/messages/send";
    pub const SEND_MEDIA: &str = "/api/v1/messages/send-media";
    pub const SEND_TEMPLATE: &str = "/api/v1/messages/send-template";
    pub const MEDIA_UPLOAD: &str = "/api/v1/media";
    pub const TEMPLATES: &str = "/api/v1/templates";
    pub const APPOINTMENT_TYPES: &str = "/api/v1/appointment-types";
    pub const REALTIME_WS: &str = "/ws/events";
}

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required field was missing or malformed; caught before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never completed (connect, TLS, timeout, socket).
    #[error("Transport error: {0}")]
    Transport(String),

    /// An optimistic send failed; the placeholder was marked failed in place.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Events emitted by the data layer for the view layer to consume.
///
/// This channel is the only coupling between the two: the view renders what
/// arrives here and never reaches into the client's internals.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A reconciliation pass or status update changed a conversation; the
    /// full (small, page-bounded) list is included as the new render state.
    ConversationUpdated {
        contact_id: String,
        messages: Vec<Message>,
    },
    /// A single message changed without a full pass (optimistic insert,
    /// failure-in-place, status advance).
    MessageUpserted {
        contact_id: String,
        message: Message,
    },
    ContactUpdated(Contact),
    /// The real-time channel dropped; history fetches still work.
    RealtimeDown { reason: String },
}

/// Client for the CRM messaging backend.
#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: Url,
    tenant_id: String,
    api_token: String,
    event_tx: mpsc::Sender<ClientEvent>,
    stores: Arc<TokioMutex<HashMap<String, ConversationStore>>>,
    state: Arc<TokioMutex<ClientState>>,
    realtime_running: Arc<AtomicBool>,
}

impl CrmClient {
    /// Create a client and the event receiver for the view layer.
    pub fn new(
        base_url: &str,
        tenant_id: &str,
        api_token: &str,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Validation(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if tenant_id.trim().is_empty() {
            return Err(ClientError::Validation("Tenant id must not be empty".into()));
        }
        if api_token.trim().is_empty() {
            return Err(ClientError::Validation("API token must not be empty".into()));
        }

        let (event_tx, event_rx) = mpsc::channel(100);

        Ok((
            Self {
                http: reqwest::Client::new(),
                base_url,
                tenant_id: tenant_id.to_string(),
                api_token: api_token.to_string(),
                event_tx,
                stores: Arc::new(TokioMutex::new(HashMap::new())),
                state: Arc::new(TokioMutex::new(ClientState::Disconnected)),
                realtime_running: Arc::new(AtomicBool::new(false)),
            },
            event_rx,
        ))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Build an absolute URL for an endpoint path.
    pub(crate) fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Validation(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    /// Attach tenant and bearer auth to a request.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_token)
            .header("X-Tenant-Id", &self.tenant_id)
    }

    /// Map a non-success response to `ClientError::Http`, keeping the body
    /// for display.
    pub(crate) async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Emit an event to the view layer. A send error means the receiver is
    /// gone; the store stays consistent either way.
    pub(crate) async fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            error!("Failed to emit client event: {}", e);
        }
    }

    /// Get a clone of the event sender, for background tasks.
    pub fn event_sender(&self) -> mpsc::Sender<ClientEvent> {
        self.event_tx.clone()
    }

    /// Snapshot of one conversation's current message list.
    pub async fn conversation(&self, contact_id: &str) -> Vec<Message> {
        let stores = self.stores.lock().await;
        stores
            .get(contact_id)
            .map(|s| s.messages().to_vec())
            .unwrap_or_default()
    }

    /// Run `f` against the (created-on-demand) store for `contact_id` and
    /// emit the updated conversation if `f` reports a change.
    pub(crate) async fn with_store<F>(&self, contact_id: &str, f: F)
    where
        F: FnOnce(&mut ConversationStore) -> bool,
    {
        let snapshot = {
            let mut stores = self.stores.lock().await;
            let store = stores
                .entry(contact_id.to_string())
                .or_insert_with(|| ConversationStore::new(contact_id));
            if !f(store) {
                return;
            }
            store.messages().to_vec()
        };

        self.emit(ClientEvent::ConversationUpdated {
            contact_id: contact_id.to_string(),
            messages: snapshot,
        })
        .await;
    }

    /// Advance a message's delivery status and notify the view layer.
    pub async fn update_message_status(&self, contact_id: &str, id: &str, status: DeliveryStatus) {
        debug!("Updating message {} to {:?}", id, status);
        self.with_store(contact_id, |store| store.mark_status(id, status))
            .await;
    }
}
