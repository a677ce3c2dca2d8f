// Appointment type management.
//
// The clinical side of the product books appointments against typed slots
// (consultation, follow-up, ...). The client only reads and manages the
// catalogue; scheduling itself is backend territory.

use log::info;
use serde::Serialize;

use super::{endpoints, ClientError, CrmClient};
use crate::models::AppointmentType;

#[derive(Debug, Serialize)]
struct CreateAppointmentTypeBody<'a> {
    name: &'a str,
    code: &'a str,
    description: Option<&'a str>,
    duration_default: u32,
    base_consultation_fee: &'a str,
    color: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchActiveBody {
    is_active: bool,
}

impl CrmClient {
    /// Fetch the tenant's appointment types, active and inactive.
    pub async fn list_appointment_types(&self) -> Result<Vec<AppointmentType>, ClientError> {
        let url = self.url(endpoints::APPOINTMENT_TYPES)?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let types: Vec<AppointmentType> = Self::check_response(response).await?.json().await?;

        info!("Retrieved {} appointment types", types.len());
        Ok(types)
    }

    /// Create an appointment type. `code` must be unique within the tenant;
    /// the backend enforces it. The fee is a decimal string, never a float.
    pub async fn create_appointment_type(
        &self,
        name: &str,
        code: &str,
        description: Option<&str>,
        duration_default: u32,
        base_consultation_fee: &str,
        color: &str,
    ) -> Result<AppointmentType, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::Validation("Appointment type name must not be empty".into()));
        }
        if code.trim().is_empty() {
            return Err(ClientError::Validation("Appointment type code must not be empty".into()));
        }

        let url = self.url(endpoints::APPOINTMENT_TYPES)?;
        let payload = CreateAppointmentTypeBody {
            name,
            code,
            description,
            duration_default,
            base_consultation_fee,
            color,
        };
        let response = self
            .authorize(self.http.post(url))
            .json(&payload)
            .send()
            .await?;
        let created: AppointmentType = Self::check_response(response).await?.json().await?;

        info!("Created appointment type {} ({})", created.name, created.code);
        Ok(created)
    }

    /// Activate or deactivate an appointment type. Types are never deleted;
    /// historical appointments keep referencing them.
    pub async fn set_appointment_type_active(
        &self,
        id: &str,
        is_active: bool,
    ) -> Result<AppointmentType, ClientError> {
        let url = self.url(&format!("{}/{}", endpoints::APPOINTMENT_TYPES, id))?;
        let response = self
            .authorize(self.http.patch(url))
            .json(&PatchActiveBody { is_active })
            .send()
            .await?;
        let updated: AppointmentType = Self::check_response(response).await?.json().await?;

        info!(
            "Appointment type {} is now {}",
            updated.code,
            if updated.is_active { "active" } else { "inactive" }
        );
        Ok(updated)
    }
}
