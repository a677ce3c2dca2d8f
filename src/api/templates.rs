// Message template CRUD.
//
// Templates are pre-approved outbound message bodies; sending one is
// handled in the messages module. This file is the management surface.

use log::info;
use serde::Serialize;

use super::{endpoints, ClientError, CrmClient};
use crate::models::MessageTemplate;

#[derive(Debug, Serialize)]
struct CreateTemplateBody<'a> {
    name: &'a str,
    language: &'a str,
    category: &'a str,
    body: &'a str,
}

impl CrmClient {
    /// Fetch all templates for the tenant.
    pub async fn list_templates(&self) -> Result<Vec<MessageTemplate>, ClientError> {
        let url = self.url(endpoints::TEMPLATES)?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let templates: Vec<MessageTemplate> = Self::check_response(response).await?.json().await?;

        info!("Retrieved {} templates", templates.len());
        Ok(templates)
    }

    /// Create a template; the backend assigns the id and owns approval.
    pub async fn create_template(
        &self,
        name: &str,
        language: &str,
        category: &str,
        body: &str,
    ) -> Result<MessageTemplate, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::Validation("Template name must not be empty".into()));
        }
        if body.trim().is_empty() {
            return Err(ClientError::Validation("Template body must not be empty".into()));
        }

        let url = self.url(endpoints::TEMPLATES)?;
        let payload = CreateTemplateBody {
            name,
            language,
            category,
            body,
        };
        let response = self
            .authorize(self.http.post(url))
            .json(&payload)
            .send()
            .await?;
        let template: MessageTemplate = Self::check_response(response).await?.json().await?;

        info!("Created template {} ({})", template.name, template.id);
        Ok(template)
    }

    /// Delete a template by id.
    pub async fn delete_template(&self, id: &str) -> Result<(), ClientError> {
        let url = self.url(&format!("{}/{}", endpoints::TEMPLATES, id))?;
        let response = self.authorize(self.http.delete(url)).send().await?;
        Self::check_response(response).await?;

        info!("Deleted template {}", id);
        Ok(())
    }
}
