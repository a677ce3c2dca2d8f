// Conversation history and outbound message sends.
//
// History fetches and sends both funnel into the conversation store: a
// fetched page is one reconciliation pass, a send is a synchronous
// placeholder insert followed by status updates as the network call
// resolves.

use anyhow::Result;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{endpoints, ClientError, ClientEvent, CrmClient};
use crate::models::{
    DeliveryStatus, Direction, MediaReference, Message, MessageKind, MessageMetadata,
    MessageState, MessageTemplate,
};
use crate::timestamp::parse_timestamp;

const SEND_MAX_RETRIES: usize = 2;

/// Wire shape of a message as the backend serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDto {
    pub id: String,
    pub direction: Direction,
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    /// Raw timestamp; heterogeneous formats are normalized on conversion.
    pub timestamp: String,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    /// Correlation id echoed back when the send carried one.
    #[serde(default)]
    pub client_ref: Option<String>,
    #[serde(default)]
    pub media: Option<MediaReference>,
}

impl MessageDto {
    /// Convert the wire record into an authoritative store message.
    pub fn into_message(self) -> Result<Message> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let status = self.status.unwrap_or(DeliveryStatus::Delivered);
        Ok(Message {
            id: self.id,
            client_id: self.client_ref,
            direction: self.direction,
            kind: self.kind,
            text: self.text,
            timestamp,
            status,
            state: MessageState::Confirmed,
            metadata: MessageMetadata {
                media: self.media,
                ..MessageMetadata::default()
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct HistoryPageDto {
    messages: Vec<MessageDto>,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SendTextBody<'a> {
    contact_id: &'a str,
    text: &'a str,
    client_ref: &'a str,
}

#[derive(Debug, Serialize)]
struct SendTemplateBody<'a> {
    contact_id: &'a str,
    template: &'a str,
    language: &'a str,
    parameters: &'a [String],
    client_ref: &'a str,
}

#[derive(Debug, Clone)]
pub struct HistoryQueryOptions {
    pub start: Option<chrono::DateTime<chrono::Utc>>,
    pub end: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<usize>,
    pub after: Option<String>, // Cursor for continuing a query
}

/// Result of one history page with information about pagination.
#[derive(Debug, Clone)]
pub struct HistoryQueryResult {
    pub messages: Vec<Message>,
    pub complete: bool,
    pub next_cursor: Option<String>,
    pub total: Option<usize>,
}

impl HistoryQueryOptions {
    pub fn new() -> Self {
        HistoryQueryOptions {
            start: None,
            end: None,
            limit: Some(100), // Default page size
            after: None,
        }
    }

    pub fn with_start(mut self, start: chrono::DateTime<chrono::Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: chrono::DateTime<chrono::Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_after(mut self, after: &str) -> Self {
        self.after = Some(after.to_string());
        self
    }
}

impl Default for HistoryQueryOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CrmClient {
    /// Fetch one page of conversation history and reconcile it into the
    /// store.
    ///
    /// # Arguments
    ///
    /// * `contact_id` - The contact whose conversation to fetch
    /// * `options` - Time range, page size, and pagination cursor
    ///
    /// # Returns
    ///
    /// The page's messages plus pagination info. The store and the event
    /// channel are updated as a side effect; callers that only render can
    /// ignore the return value.
    pub async fn fetch_conversation_history(
        &self,
        contact_id: &str,
        options: HistoryQueryOptions,
    ) -> Result<HistoryQueryResult, ClientError> {
        info!(
            "Fetching history for contact {} with options: {:?}",
            contact_id, options
        );

        let mut url = self.url(&format!(
            "{}/{}/messages",
            endpoints::CONVERSATIONS,
            contact_id
        ))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = options.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(after) = &options.after {
                query.append_pair("after", after);
            }
            if let Some(start) = options.start {
                query.append_pair("start", &start.to_rfc3339());
            }
            if let Some(end) = options.end {
                query.append_pair("end", &end.to_rfc3339());
            }
        }

        let response = self.authorize(self.http.get(url)).send().await?;
        let page: HistoryPageDto = Self::check_response(response).await?.json().await?;

        let mut messages = Vec::with_capacity(page.messages.len());
        for dto in page.messages {
            match dto.into_message() {
                Ok(message) => messages.push(message),
                // A single malformed record must not sink the whole page.
                Err(e) => warn!("Skipping malformed history record: {}", e),
            }
        }
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        info!(
            "Retrieved {} archived messages for contact {}",
            messages.len(),
            contact_id
        );

        self.with_store(contact_id, |store| {
            store.apply_authoritative(&messages);
            true
        })
        .await;

        Ok(HistoryQueryResult {
            messages,
            complete: page.complete,
            next_cursor: page.next_cursor,
            total: page.total,
        })
    }

    /// Continue loading history in the background until the archive is
    /// exhausted or `max_pages` is reached. Each page is reconciled into the
    /// store as it arrives, so the view fills in progressively.
    pub async fn load_complete_history_in_background(
        &self,
        contact_id: &str,
        initial_result: HistoryQueryResult,
        max_pages: usize,
    ) -> Result<(), ClientError> {
        info!("Starting background history load for {}", contact_id);

        let mut current = initial_result;
        let mut page_count = 1;

        while !current.complete && page_count < max_pages {
            let cursor = match &current.next_cursor {
                Some(cursor) => cursor.clone(),
                None => break, // No cursor to continue from
            };

            // Brief pause between pages to avoid flooding the backend
            tokio::time::sleep(Duration::from_millis(300)).await;

            let next_options = HistoryQueryOptions::new().with_after(&cursor).with_limit(100);

            match self.fetch_conversation_history(contact_id, next_options).await {
                Ok(result) => {
                    if result.messages.is_empty() {
                        break;
                    }
                    info!(
                        "Retrieved history page {} with {} additional messages for {}",
                        page_count + 1,
                        result.messages.len(),
                        contact_id
                    );
                    current = result;
                    page_count += 1;
                }
                Err(e) => {
                    error!(
                        "Error retrieving additional history for {}: {}",
                        contact_id, e
                    );
                    return Err(e);
                }
            }
        }

        info!(
            "Completed background history load for {} ({} pages retrieved)",
            contact_id, page_count
        );
        Ok(())
    }

    /// Send a plain text message.
    ///
    /// A placeholder is inserted synchronously before the network call; on
    /// acknowledgment it advances to Delivered, on failure it is marked
    /// failed in place with the error retained. It is never removed.
    pub async fn send_text_message(
        &self,
        contact_id: &str,
        text: &str,
    ) -> Result<Message, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation("Message text must not be empty".into()));
        }

        let mut placeholder = Message::placeholder(MessageKind::Text, text);
        let client_ref = placeholder
            .client_id
            .clone()
            .unwrap_or_else(|| placeholder.id.clone());
        self.insert_placeholder(contact_id, placeholder.clone()).await;

        let body = SendTextBody {
            contact_id,
            text,
            client_ref: &client_ref,
        };
        let url = self.url(endpoints::SEND_TEXT)?;

        match self.post_send(url, &body).await {
            Ok(()) => {
                info!("Message {} acknowledged by backend", client_ref);
                self.update_message_status(contact_id, &client_ref, DeliveryStatus::Delivered)
                    .await;
                placeholder.status = DeliveryStatus::Delivered;
                Ok(placeholder)
            }
            Err(e) => {
                error!("Failed to send message {}: {}", client_ref, e);
                self.fail_placeholder(contact_id, &client_ref, &e.to_string())
                    .await;
                Err(ClientError::SendFailed(e.to_string()))
            }
        }
    }

    /// Send a pre-approved template message with positional parameters.
    ///
    /// The placeholder carries the locally rendered body so the view shows
    /// real text immediately; the backend's rendered copy (which may add
    /// header/footer text) replaces it on reconciliation.
    pub async fn send_template_message(
        &self,
        contact_id: &str,
        template: &MessageTemplate,
        parameters: &[String],
    ) -> Result<Message, ClientError> {
        if template.name.trim().is_empty() {
            return Err(ClientError::Validation("Template name must not be empty".into()));
        }

        let rendered = render_template_body(&template.body, parameters);
        let mut placeholder = Message::placeholder(MessageKind::Template, rendered);
        placeholder.metadata.template_name = Some(template.name.clone());
        let client_ref = placeholder
            .client_id
            .clone()
            .unwrap_or_else(|| placeholder.id.clone());
        self.insert_placeholder(contact_id, placeholder.clone()).await;

        let body = SendTemplateBody {
            contact_id,
            template: &template.name,
            language: &template.language,
            parameters,
            client_ref: &client_ref,
        };
        let url = self.url(endpoints::SEND_TEMPLATE)?;

        match self.post_send(url, &body).await {
            Ok(()) => {
                info!("Template message {} acknowledged by backend", client_ref);
                self.update_message_status(contact_id, &client_ref, DeliveryStatus::Delivered)
                    .await;
                placeholder.status = DeliveryStatus::Delivered;
                Ok(placeholder)
            }
            Err(e) => {
                error!("Failed to send template message {}: {}", client_ref, e);
                self.fail_placeholder(contact_id, &client_ref, &e.to_string())
                    .await;
                Err(ClientError::SendFailed(e.to_string()))
            }
        }
    }

    /// Insert a placeholder into the store and notify the view layer. This
    /// is the synchronous half of the optimistic send path.
    pub(crate) async fn insert_placeholder(&self, contact_id: &str, placeholder: Message) {
        let event = ClientEvent::MessageUpserted {
            contact_id: contact_id.to_string(),
            message: placeholder.clone(),
        };
        self.with_store(contact_id, |store| {
            store.insert_placeholder(placeholder);
            false // The upsert event below carries the change
        })
        .await;
        self.emit(event).await;
    }

    /// Mark a placeholder failed in place and notify the view layer.
    pub(crate) async fn fail_placeholder(&self, contact_id: &str, client_ref: &str, error: &str) {
        self.with_store(contact_id, |store| store.mark_failed(client_ref, error))
            .await;
    }

    /// POST a send body with bounded retry. Backoff with jitter between
    /// attempts; the attempt count stays small so failures surface quickly.
    pub(crate) async fn post_send<B: Serialize>(
        &self,
        url: url::Url,
        body: &B,
    ) -> Result<(), ClientError> {
        let mut last_error = None;

        for attempt in 1..=SEND_MAX_RETRIES {
            debug!("Sending message attempt {}/{}", attempt, SEND_MAX_RETRIES);
            let result = self
                .authorize(self.http.post(url.clone()))
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => match Self::check_response(response).await {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        error!("Send attempt {} rejected: {}", attempt, e);
                        // 4xx will not improve on retry
                        if let ClientError::Http { status, .. } = &e {
                            if *status < 500 {
                                return Err(e);
                            }
                        }
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    error!("Send attempt {} failed: {}", attempt, e);
                    last_error = Some(e.into());
                }
            }

            if attempt < SEND_MAX_RETRIES {
                backoff_with_jitter(attempt).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Transport("Send failed with no response".into())))
    }
}

/// Substitute positional `{{n}}` parameters into a template body.
pub fn render_template_body(body: &str, parameters: &[String]) -> String {
    let mut rendered = body.to_string();
    for (i, param) in parameters.iter().enumerate() {
        rendered = rendered.replace(&format!("{{{{{}}}}}", i + 1), param);
    }
    rendered
}

/// Exponential backoff with jitter between send attempts.
pub(crate) async fn backoff_with_jitter(attempt: usize) {
    let backoff_base = 500 * 2u64.pow(attempt as u32);
    let jitter = rand::random::<u64>() % 500;
    let backoff = Duration::from_millis(backoff_base + jitter);
    info!("Retrying send in {:?}...", backoff);
    tokio::time::sleep(backoff).await;
}
