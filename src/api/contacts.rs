// Contact list and lookup.

use log::{info, warn};
use serde::Deserialize;

use super::{endpoints, ClientError, CrmClient};
use crate::models::Contact;
use crate::timestamp::parse_timestamp;

#[derive(Debug, Deserialize)]
pub(crate) struct ContactDto {
    id: String,
    name: String,
    phone: String,
    /// Conversation window expiry, backend-defined; raw timestamp form.
    #[serde(default)]
    window_expires_at: Option<String>,
}

impl ContactDto {
    pub(crate) fn into_contact(self) -> Contact {
        let window_expires_at = self.window_expires_at.as_deref().and_then(|raw| {
            match parse_timestamp(raw) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!("Ignoring malformed window expiry for contact {}: {}", self.id, e);
                    None
                }
            }
        });
        Contact {
            id: self.id,
            name: self.name,
            phone: self.phone,
            window_expires_at,
        }
    }
}

impl CrmClient {
    /// Fetch the tenant's contact list.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, ClientError> {
        let url = self.url(endpoints::CONTACTS)?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let contacts: Vec<ContactDto> = Self::check_response(response).await?.json().await?;

        info!("Retrieved {} contacts", contacts.len());
        Ok(contacts.into_iter().map(ContactDto::into_contact).collect())
    }

    /// Look up a contact by phone number. Returns None when the backend has
    /// no record for it.
    pub async fn lookup_contact(&self, phone: &str) -> Result<Option<Contact>, ClientError> {
        if phone.trim().is_empty() {
            return Err(ClientError::Validation("Phone number must not be empty".into()));
        }

        let mut url = self.url(endpoints::CONTACT_LOOKUP)?;
        url.query_pairs_mut().append_pair("phone", phone);

        let response = self.authorize(self.http.get(url)).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let contact: ContactDto = Self::check_response(response).await?.json().await?;
        Ok(Some(contact.into_contact()))
    }
}
