use std::path::PathBuf;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};

/// Persisted OAuth2 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Margin subtracted from `expires_at` so a token is refreshed before it
/// lapses mid-run.
const EXPIRY_MARGIN_SECS: i64 = 60;

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at - EXPIRY_MARGIN_SECS
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token: Option<StoredToken>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("soundcloud-organizer").join("config.toml"))
    }

    /// Load the config file, or fall back to defaults if it doesn't exist yet
    pub fn load_or_default() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Write the config back to its default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(eyre!("No config directory available"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create config directory: {}",
                parent.display()
            ))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .context(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Create a default config file, if it doesn't exist
    pub fn create_default() -> Result<()> {
        let path = Self::config_path().ok_or(eyre!("No config directory available"))?;
        if path.exists() {
            log::info!("Config file already exists at {}", path.display());
            return Ok(());
        }
        Self::default().save()
    }
}
