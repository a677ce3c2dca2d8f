// Connection management for the CRM client.
// Contains connect, disconnect, and the auth probe behind them.

use log::{error, info};
use std::time::Duration;

use super::{endpoints, ClientError, CrmClient};

/// Enum for representing client state
#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    Connected,
    Disconnected,
    Connecting,
    Error,
}

impl CrmClient {
    /// Validate credentials against the backend and start the real-time
    /// loop. Retries the auth probe with backoff before giving up.
    pub async fn connect(&self) -> Result<(), ClientError> {
        {
            let mut state = self.state.lock().await;
            *state = ClientState::Connecting;
        }

        let mut last_error = None;
        for attempt in 1..=3 {
            info!("Probing backend auth (attempt {}/3)...", attempt);
            match self.probe_auth().await {
                Ok(()) => {
                    info!(
                        "Authenticated against {} as tenant {}",
                        self.base_url, self.tenant_id
                    );
                    {
                        let mut state = self.state.lock().await;
                        *state = ClientState::Connected;
                    }
                    self.spawn_realtime_loop();
                    return Ok(());
                }
                Err(e) => {
                    error!("Auth probe failed on attempt {}/3: {}", attempt, e);
                    // Rejected credentials will not improve on retry
                    if let ClientError::Http { status, .. } = &e {
                        if *status == 401 || *status == 403 {
                            let mut state = self.state.lock().await;
                            *state = ClientState::Error;
                            return Err(e);
                        }
                    }
                    last_error = Some(e);
                }
            }

            if attempt < 3 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                info!("Retrying connection in {:?}", backoff);
                tokio::time::sleep(backoff).await;
            }
        }

        {
            let mut state = self.state.lock().await;
            *state = ClientState::Error;
        }
        Err(last_error
            .unwrap_or_else(|| ClientError::Transport("Failed to reach backend after 3 attempts".into())))
    }

    /// Stop the real-time loop and mark the client disconnected. REST calls
    /// keep working; this only tears down the push channel.
    pub async fn disconnect(&self) {
        info!("Disconnecting from backend");
        self.stop_realtime();
        let mut state = self.state.lock().await;
        *state = ClientState::Disconnected;
    }

    pub async fn state(&self) -> ClientState {
        self.state.lock().await.clone()
    }

    async fn probe_auth(&self) -> Result<(), ClientError> {
        let url = self.url(endpoints::ME)?;
        let response = self.authorize(self.http.get(url)).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
