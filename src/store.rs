// Per-conversation message store.
//
// One store instance owns the ordered message list for one conversation,
// mirroring the single viewing component that renders it. All mutation is
// synchronous; reconciliation passes are applied strictly in arrival order
// and the list invariants (unique by id, ascending timestamp) hold after
// every call.

use log::{debug, warn};

use crate::models::{DeliveryStatus, Message};
use crate::reconcile::{dedup_and_sort, reconcile};

pub struct ConversationStore {
    contact_id: String,
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new(contact_id: impl Into<String>) -> Self {
        ConversationStore {
            contact_id: contact_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append an optimistic placeholder. This happens synchronously with the
    /// user action, before any network call resolves.
    pub fn insert_placeholder(&mut self, message: Message) {
        debug!(
            "Inserting placeholder {} into conversation {}",
            message.id, self.contact_id
        );
        self.messages.push(message);
        self.messages = dedup_and_sort(std::mem::take(&mut self.messages));
    }

    /// Mark the placeholder identified by `client_id` as failed, in place.
    /// The record stays in the list with the error retained.
    pub fn mark_failed(&mut self, client_id: &str, error: &str) -> bool {
        let record = self
            .messages
            .iter_mut()
            .find(|m| m.client_id.as_deref() == Some(client_id) || m.id == client_id);

        match record {
            Some(message) if message.status.may_become(DeliveryStatus::Failed) => {
                message.mark_failed(error);
                true
            }
            Some(message) => {
                warn!(
                    "Ignoring failure for message {} in status {:?}",
                    message.id, message.status
                );
                false
            }
            None => {
                warn!(
                    "No message {} in conversation {} to mark failed",
                    client_id, self.contact_id
                );
                false
            }
        }
    }

    /// Advance the delivery status of an outgoing message. Illegal
    /// transitions (anything out of Failed, anything backwards) are logged
    /// and ignored.
    pub fn mark_status(&mut self, id: &str, status: DeliveryStatus) -> bool {
        let record = self
            .messages
            .iter_mut()
            .find(|m| m.id == id || m.client_id.as_deref() == Some(id));

        match record {
            // A duplicate ack (e.g. the REST ack racing the real-time echo)
            // is a no-op, not a violation.
            Some(message) if message.status == status => false,
            Some(message) if message.status.may_become(status) => {
                debug!(
                    "Message {} status {:?} -> {:?}",
                    message.id, message.status, status
                );
                message.status = status;
                true
            }
            Some(message) => {
                warn!(
                    "Ignoring status transition {:?} -> {:?} for message {}",
                    message.status, status, message.id
                );
                false
            }
            None => {
                debug!("Status update for unknown message {}", id);
                false
            }
        }
    }

    /// Record a finished media upload on a pending placeholder.
    pub fn complete_upload(&mut self, client_id: &str, media: crate::models::MediaReference) -> bool {
        let record = self
            .messages
            .iter_mut()
            .find(|m| m.client_id.as_deref() == Some(client_id) || m.id == client_id);

        match record {
            Some(message) => {
                message.metadata.media = Some(media);
                message.metadata.uploading = false;
                true
            }
            None => {
                warn!(
                    "No message {} in conversation {} to complete upload for",
                    client_id, self.contact_id
                );
                false
            }
        }
    }

    /// Apply one reconciliation pass with a batch of authoritative messages.
    pub fn apply_authoritative(&mut self, batch: &[Message]) {
        debug!(
            "Reconciling {} authoritative messages into conversation {} ({} present)",
            batch.len(),
            self.contact_id,
            self.messages.len()
        );
        self.messages = reconcile(&self.messages, batch);
    }
}
