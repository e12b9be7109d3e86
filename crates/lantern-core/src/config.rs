//! Configuration system for Lantern.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LANTERN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lantern/config.toml
//!   3. ~/.config/lantern/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanternConfig {
    pub store: StoreConfig,
    pub sde: SdeConfig,
    pub ssid: SsidConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Published service list database.
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdeConfig {
    /// UDP port the responder binds.
    pub port: u16,
}

/// How the SSID advertisement reaches the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsidBackend {
    /// Drive the wireless interface directly.
    Wireless,
    /// Persist the SSID to a plain file — development and tests only.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsidConfig {
    pub backend: SsidBackend,
    /// Wireless interface name for the `wireless` backend.
    pub interface: String,
    /// SSID file for the `file` backend.
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Static HTML shell the CGI binary serves.
    pub ui_path: PathBuf,
    /// CGI log file — stdout is the HTTP response, so logs go elsewhere.
    pub log_path: PathBuf,
    /// Category database shown in the publish UI.
    pub category_db_path: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./service_list.db"),
        }
    }
}

impl Default for SdeConfig {
    fn default() -> Self {
        Self {
            port: crate::sde::SDE_PORT,
        }
    }
}

impl Default for SsidConfig {
    fn default() -> Self {
        Self {
            backend: SsidBackend::Wireless,
            interface: "wlan0".to_string(),
            file_path: PathBuf::from("./ssid.dat"),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ui_path: PathBuf::from("./ui.html"),
            log_path: PathBuf::from("./lantern-publish.log"),
            category_db_path: PathBuf::from("./category_list.db"),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl LanternConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LanternConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LANTERN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply LANTERN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LANTERN_STORE__DB_PATH") {
            self.store.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LANTERN_SDE__PORT") {
            if let Ok(p) = v.parse() {
                self.sde.port = p;
            }
        }
        if let Ok(v) = std::env::var("LANTERN_SSID__BACKEND") {
            match v.as_str() {
                "wireless" => self.ssid.backend = SsidBackend::Wireless,
                "file" => self.ssid.backend = SsidBackend::File,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("LANTERN_SSID__INTERFACE") {
            self.ssid.interface = v;
        }
        if let Ok(v) = std::env::var("LANTERN_SSID__FILE_PATH") {
            self.ssid.file_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LANTERN_PUBLISH__UI_PATH") {
            self.publish.ui_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LANTERN_PUBLISH__LOG_PATH") {
            self.publish.log_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LANTERN_PUBLISH__CATEGORY_DB_PATH") {
            self.publish.category_db_path = PathBuf::from(v);
        }
    }
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("lantern")
}
