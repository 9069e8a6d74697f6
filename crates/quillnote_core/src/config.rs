//! Core configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! data_dir = "/home/me/.local/share/quillnote"
//! log_level = "info"
//!
//! [peer_sync]
//! enabled = false
//! signaling_urls = ["wss://signaling.yjs.dev"]
//! connect_timeout_ms = 5000
//! ```

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SIGNALING_URL: &str = "wss://signaling.yjs.dev";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Configuration load and validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to access config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize config: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Peer-sync settings for shared-document sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSyncConfig {
    pub enabled: bool,
    pub signaling_urls: Vec<String>,
    pub connect_timeout_ms: u64,
}

impl Default for PeerSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            signaling_urls: vec![DEFAULT_SIGNALING_URL.to_string()],
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl PeerSyncConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory holding the database and logs. Must be absolute.
    pub data_dir: PathBuf,
    pub log_level: String,
    pub peer_sync: PeerSyncConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level().to_string(),
            peer_sync: PeerSyncConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Like [`CoreConfig::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.data_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "data_dir must be an absolute path, got `{}`",
                self.data_dir.display()
            )));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;

        let peer_sync = &self.peer_sync;
        if peer_sync.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "peer_sync.connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if peer_sync.enabled && peer_sync.signaling_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "peer_sync.signaling_urls must not be empty when peer sync is enabled"
                    .to_string(),
            ));
        }
        for raw in &peer_sync.signaling_urls {
            let valid = Url::parse(raw)
                .map(|url| matches!(url.scheme(), "ws" | "wss"))
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "peer_sync.signaling_urls entry `{raw}` is not a ws:// or wss:// URL"
                )));
            }
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .filter(|home| home.is_absolute())
        .unwrap_or_else(std::env::temp_dir)
        .join(".quillnote")
}
