//! Persisted conductor configuration.
//!
//! Port values and app/zome identifiers with well-known defaults, written
//! back to disk the first time they are read so the user has something to
//! edit. Storage is a JSON file under the user config directory.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] io::Error),
    #[error("config parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no user config directory on this platform")]
    NoConfigDir,
}

/// Ports and identifiers for talking to a local conductor.
///
/// Every field has a stock-deployment default, so a partial (or absent)
/// config file still yields a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// App interface websocket port.
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    /// Admin interface websocket port.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    /// Installed app id the clients attach to.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// App id used when provisioning the hub.
    #[serde(default = "default_hub_app_id")]
    pub hub_app_id: String,
    /// DNA bundle path handed to the conductor during hub provisioning.
    #[serde(default = "default_hub_dna_path")]
    pub hub_dna_path: String,
    /// Role id the hub DNA is installed under.
    #[serde(default = "default_hub_role_id")]
    pub hub_role_id: String,
    /// Zome the paper operations live in.
    #[serde(default = "default_paperz_zome")]
    pub paperz_zome: String,
    /// Zome the meme operations live in.
    #[serde(default = "default_memez_zome")]
    pub memez_zome: String,
}

fn default_app_port() -> u16 {
    9999
}

fn default_admin_port() -> u16 {
    9000
}

fn default_app_id() -> String {
    "test-app".into()
}

fn default_hub_app_id() -> String {
    "hub".into()
}

fn default_hub_dna_path() -> String {
    "./happs/hub/hub.dna".into()
}

fn default_hub_role_id() -> String {
    "thedna".into()
}

fn default_paperz_zome() -> String {
    "paperz_main_zome".into()
}

fn default_memez_zome() -> String {
    "memez_main_zome".into()
}

/// Keys checked for presence so partially-written files get completed.
const KEYS: &[&str] = &[
    "app_port",
    "admin_port",
    "app_id",
    "hub_app_id",
    "hub_dna_path",
    "hub_role_id",
    "paperz_zome",
    "memez_zome",
];

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            app_port: default_app_port(),
            admin_port: default_admin_port(),
            app_id: default_app_id(),
            hub_app_id: default_hub_app_id(),
            hub_dna_path: default_hub_dna_path(),
            hub_role_id: default_hub_role_id(),
            paperz_zome: default_paperz_zome(),
            memez_zome: default_memez_zome(),
        }
    }
}

impl ConductorConfig {
    /// Default config file location: `<user config dir>/paperz/config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("paperz").join("config.json"))
    }

    /// Load the config, filling in and persisting defaults for anything
    /// missing. A missing file becomes a fully-defaulted one on disk.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let raw: serde_json::Value = serde_json::from_str(&text)?;
                let config: ConductorConfig = serde_json::from_value(raw.clone())?;
                let complete = raw
                    .as_object()
                    .is_some_and(|obj| KEYS.iter().all(|k| obj.contains_key(*k)));
                if !complete {
                    config.save(path)?;
                    info!(path = %path.display(), "completed partial conductor config");
                }
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                info!(path = %path.display(), "wrote default conductor config");
                Ok(config)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Admin interface websocket URL.
    pub fn admin_url(&self) -> String {
        format!("ws://localhost:{}", self.admin_port)
    }

    /// App interface websocket URL.
    pub fn app_url(&self) -> String {
        format!("ws://localhost:{}", self.app_port)
    }
}
