use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

/// A saved backend login profile. The API token is base64-armored at rest;
/// this is obfuscation against casual inspection, not encryption.
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub base_url: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Credentials {
    pub fn new(base_url: &str, tenant_id: &str, api_token: &str) -> Self {
        Credentials {
            base_url: base_url.to_string(),
            tenant_id: tenant_id.to_string(),
            api_token: Some(BASE64.encode(api_token)),
        }
    }

    pub fn get_api_token(&self) -> Option<String> {
        self.api_token.as_ref().map(|encoded| {
            String::from_utf8(BASE64.decode(encoded).unwrap_or_default()).unwrap_or_default()
        })
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("careline");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn save_credentials(credentials: &Credentials) -> Result<()> {
    let config_path = get_config_path()?;
    let file = File::create(config_path)?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for tenant {}", credentials.tenant_id);
    Ok(())
}

pub fn load_credentials() -> Result<Option<Credentials>> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(None);
    }

    let config_path_str = config_path.display().to_string();

    let mut file = File::open(config_path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let credentials: Credentials = serde_json::from_str(&contents)?;
    info!(
        "Loaded credentials for tenant {} from {}",
        credentials.tenant_id, config_path_str
    );

    Ok(Some(credentials))
}

static CONFIG_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Override where credentials are stored. Used by tests and the
/// --config-dir flag; first call wins.
pub fn set_config_path_override(path: PathBuf) {
    let _ = CONFIG_PATH_OVERRIDE.set(path);
}

fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("credentials.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_armor() {
        let credentials = Credentials::new("https://crm.example.com", "clinic-1", "s3cr3t");
        assert_eq!(credentials.get_api_token().as_deref(), Some("s3cr3t"));
        // The stored form is not the raw token
        assert_ne!(credentials.api_token.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        set_config_path_override(dir.path().join("credentials.json"));

        let credentials = Credentials::new("https://crm.example.com", "clinic-1", "s3cr3t");
        save_credentials(&credentials).unwrap();

        let loaded = load_credentials().unwrap().expect("credentials should exist");
        assert_eq!(loaded.base_url, "https://crm.example.com");
        assert_eq!(loaded.tenant_id, "clinic-1");
        assert_eq!(loaded.get_api_token().as_deref(), Some("s3cr3t"));
    }
}
