// Media upload and the media send path.
//
// A media send is a two-step boundary: upload the bytes to get a reference,
// then send a message carrying that reference. The placeholder covers both
// steps; a failure in either marks it failed in place.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{endpoints, ClientError, CrmClient};
use crate::models::{DeliveryStatus, MediaReference, Message, MessageKind};

#[derive(Debug, Deserialize)]
struct UploadResponseDto {
    id: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMediaBody<'a> {
    contact_id: &'a str,
    media_id: Option<&'a str>,
    media_url: Option<&'a str>,
    kind: MessageKind,
    caption: &'a str,
    client_ref: &'a str,
}

impl CrmClient {
    /// Upload media bytes and return the backend's reference for them.
    pub async fn upload_media(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaReference, ClientError> {
        if bytes.is_empty() {
            return Err(ClientError::Validation("Media payload must not be empty".into()));
        }

        info!("Uploading media {} ({}, {} bytes)", filename, mime_type, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| ClientError::Validation(format!("Invalid MIME type '{}': {}", mime_type, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url(endpoints::MEDIA_UPLOAD)?;
        let response = self
            .authorize(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponseDto = Self::check_response(response).await?.json().await?;

        Ok(MediaReference {
            id: uploaded.id,
            url: uploaded.url,
            filename: Some(filename.to_string()),
            mime_type: Some(mime_type.to_string()),
        })
    }

    /// Send a media message from a local file.
    ///
    /// The placeholder is inserted synchronously with an upload-in-progress
    /// flag and the local file name, so the view can render a preview
    /// immediately. Upload failure and send failure both mark it failed in
    /// place.
    pub async fn send_media_message(
        &self,
        contact_id: &str,
        path: &Path,
        caption: &str,
    ) -> Result<Message, ClientError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Validation(format!("Invalid media path: {}", path.display())))?
            .to_string();
        let mime_type = mime_for_extension(path);
        let kind = MessageKind::from_mime(&mime_type);

        let mut placeholder = Message::placeholder(kind, caption);
        placeholder.metadata.uploading = true;
        placeholder.metadata.media = Some(MediaReference {
            filename: Some(filename.clone()),
            mime_type: Some(mime_type.clone()),
            ..MediaReference::default()
        });
        let client_ref = placeholder
            .client_id
            .clone()
            .unwrap_or_else(|| placeholder.id.clone());
        self.insert_placeholder(contact_id, placeholder.clone()).await;

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("Failed to read {}: {}", path.display(), e);
                self.fail_placeholder(contact_id, &client_ref, &message).await;
                return Err(ClientError::SendFailed(message));
            }
        };

        let media = match self.upload_media(&filename, &mime_type, bytes).await {
            Ok(media) => media,
            Err(e) => {
                error!("Media upload failed for {}: {}", client_ref, e);
                self.fail_placeholder(contact_id, &client_ref, &e.to_string()).await;
                return Err(ClientError::SendFailed(e.to_string()));
            }
        };

        self.with_store(contact_id, |store| {
            store.complete_upload(&client_ref, media.clone())
        })
        .await;

        let body = SendMediaBody {
            contact_id,
            media_id: media.id.as_deref(),
            media_url: media.url.as_deref(),
            kind,
            caption,
            client_ref: &client_ref,
        };
        let url = self.url(endpoints::SEND_MEDIA)?;

        match self.post_send(url, &body).await {
            Ok(()) => {
                info!("Media message {} acknowledged by backend", client_ref);
                self.update_message_status(contact_id, &client_ref, DeliveryStatus::Delivered)
                    .await;
                placeholder.status = DeliveryStatus::Delivered;
                placeholder.metadata.uploading = false;
                placeholder.metadata.media = Some(media);
                Ok(placeholder)
            }
            Err(e) => {
                error!("Failed to send media message {}: {}", client_ref, e);
                self.fail_placeholder(contact_id, &client_ref, &e.to_string()).await;
                Err(ClientError::SendFailed(e.to_string()))
            }
        }
    }
}

/// Minimal extension-to-MIME mapping for the media types the channel accepts.
fn mime_for_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
