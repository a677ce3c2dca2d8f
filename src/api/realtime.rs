// Real-time event channel.
//
// The backend pushes message and contact events over a WebSocket. Every
// message event becomes a reconciliation pass on the owning conversation;
// the socket reconnects with capped backoff until the client disconnects.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use url::Url;

use super::contacts::ContactDto;
use super::messages::MessageDto;
use super::{endpoints, ClientError, ClientEvent, CrmClient};
use crate::models::DeliveryStatus;

/// Wire events on the real-time channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum RealtimeEvent {
    #[serde(rename = "message.created")]
    MessageCreated {
        contact_id: String,
        message: MessageDto,
    },
    #[serde(rename = "message.status")]
    MessageStatus {
        contact_id: String,
        id: String,
        status: DeliveryStatus,
    },
    #[serde(rename = "contact.updated")]
    ContactUpdated { contact: ContactDto },
}

impl CrmClient {
    /// Spawn the background real-time loop. Idempotent; a second call while
    /// the loop runs is a no-op.
    pub(crate) fn spawn_realtime_loop(&self) {
        if self.realtime_running.swap(true, Ordering::SeqCst) {
            debug!("Real-time loop already running");
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            client.run_realtime_loop().await;
        });
    }

    pub(crate) fn stop_realtime(&self) {
        self.realtime_running.store(false, Ordering::SeqCst);
    }

    async fn run_realtime_loop(self) {
        let mut attempt: u32 = 0;

        while self.realtime_running.load(Ordering::SeqCst) {
            match self.consume_realtime().await {
                Ok(()) => {
                    // Server closed cleanly; reconnect from a fresh backoff
                    attempt = 0;
                }
                Err(e) => {
                    error!("Real-time channel error: {}", e);
                    self.emit(ClientEvent::RealtimeDown {
                        reason: e.to_string(),
                    })
                    .await;
                }
            }

            if !self.realtime_running.load(Ordering::SeqCst) {
                break;
            }

            attempt = attempt.saturating_add(1);
            let backoff_base = 500 * 2u64.pow(attempt.min(6));
            let jitter = rand::random::<u64>() % 500;
            let backoff = Duration::from_millis(backoff_base + jitter);
            info!("Reconnecting real-time channel in {:?}", backoff);
            tokio::time::sleep(backoff).await;
        }

        info!("Real-time loop stopped");
    }

    fn realtime_url(&self) -> Result<Url, ClientError> {
        let mut url = self.url(endpoints::REALTIME_WS)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Validation("Base URL cannot carry a WebSocket scheme".into()))?;
        url.query_pairs_mut()
            .append_pair("token", &self.api_token)
            .append_pair("tenant", &self.tenant_id);
        Ok(url)
    }

    /// Connect and drain the socket until it closes or errors.
    async fn consume_realtime(&self) -> Result<(), ClientError> {
        let url = self.realtime_url()?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        info!("Real-time channel connected");

        let (mut write, mut read) = socket.split();

        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsFrame::Text(text)) => self.dispatch_realtime(&text).await,
                Ok(WsFrame::Ping(payload)) => {
                    if let Err(e) = write.send(WsFrame::Pong(payload)).await {
                        return Err(ClientError::Transport(e.to_string()));
                    }
                }
                Ok(WsFrame::Close(_)) => {
                    info!("Real-time channel closed by backend");
                    return Ok(());
                }
                Ok(_) => {} // Binary and pong frames are not part of the protocol
                Err(e) => return Err(ClientError::Transport(e.to_string())),
            }
        }

        Ok(())
    }

    async fn dispatch_realtime(&self, text: &str) {
        let event = match serde_json::from_str::<RealtimeEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring unrecognized real-time frame: {}", e);
                return;
            }
        };

        match event {
            RealtimeEvent::MessageCreated { contact_id, message } => {
                match message.into_message() {
                    Ok(message) => {
                        debug!("Real-time message {} for contact {}", message.id, contact_id);
                        self.with_store(&contact_id, |store| {
                            store.apply_authoritative(std::slice::from_ref(&message));
                            true
                        })
                        .await;
                    }
                    Err(e) => warn!("Dropping malformed real-time message: {}", e),
                }
            }
            RealtimeEvent::MessageStatus {
                contact_id,
                id,
                status,
            } => {
                self.update_message_status(&contact_id, &id, status).await;
            }
            RealtimeEvent::ContactUpdated { contact } => {
                self.emit(ClientEvent::ContactUpdated(contact.into_contact()))
                    .await;
            }
        }
    }
}
