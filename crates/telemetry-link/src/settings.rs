//! TOML settings for the live stream and companion API.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration pointed at `localhost:8000`.
//!
//! ```toml
//! [stream]
//! url = "wss://telemetry.example.com/ws"
//! reconnect_delay_ms = 3000
//! connect_failure_delay_ms = 5000
//! max_attempts = 20
//! auto_reconnect = true
//!
//! [stream.headers]
//! Authorization = "Bearer token"
//!
//! [companion]
//! base_url = "https://telemetry.example.com"
//! timeout_ms = 30000
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemetry_link_net::live::{LiveClientConfig, ReconnectPolicy};

/// Errors from loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("settings file {}: {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The TOML text is invalid or does not match the settings schema.
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    /// The settings could not be rendered as TOML.
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Live stream settings (`[stream]`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Endpoint to connect to.
    pub url: String,
    /// Delay before reconnecting after a close or transport error.
    pub reconnect_delay_ms: u64,
    /// Delay before retrying when the transport could not be created.
    pub connect_failure_delay_ms: u64,
    /// Give up after this many consecutive reconnects. Unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Reconnect automatically after unexpected closes.
    pub auto_reconnect: bool,
    /// Extra handshake headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            reconnect_delay_ms: 3000,
            connect_failure_delay_ms: 5000,
            max_attempts: None,
            auto_reconnect: true,
            headers: BTreeMap::new(),
        }
    }
}

impl StreamSettings {
    /// Build the client configuration these settings describe.
    pub fn client_config(&self) -> LiveClientConfig {
        let mut config = self
            .headers
            .iter()
            .fold(LiveClientConfig::new(), |config, (name, value)| {
                config.header(name.as_str(), value.as_str())
            });

        if self.auto_reconnect {
            let mut policy = ReconnectPolicy::new()
                .delay(Duration::from_millis(self.reconnect_delay_ms))
                .connect_failure_delay(Duration::from_millis(self.connect_failure_delay_ms));
            if let Some(max) = self.max_attempts {
                policy = policy.max_attempts(max);
            }
            config = config.reconnect_policy(policy);
        } else {
            config = config.without_reconnect();
        }
        config
    }
}

/// Companion REST settings (`[companion]`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompanionSettings {
    /// Base URL of the REST API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl CompanionSettings {
    /// Build a companion client from these settings.
    #[cfg(feature = "companion")]
    pub fn build_client(&self) -> telemetry_link_net::Result<telemetry_link_net::CompanionClient> {
        telemetry_link_net::CompanionClient::builder(self.base_url.as_str())
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()
    }
}

/// All Telemetry Link settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Live stream settings.
    pub stream: StreamSettings,
    /// Companion REST settings.
    pub companion: CompanionSettings,
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = text.parse()?;
        tracing::debug!(target: "telemetry_link", path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Read settings from `path`, falling back to defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render settings as TOML text.
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl FromStr for Settings {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
