//! Service configuration.
//!
//! Read from an optional JSON file; every field has a default so an empty
//! object is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dadpass_common::{Error, Result};
use dadpass_crypto::{EnvKeyProvider, FileKeyProvider, MasterKeyProvider, DEFAULT_KEY_ENV};
use dadpass_messages::MessageStoreConfig;

/// Which record store to use and how to build it.
///
/// `type` picks the registry entry; the remaining fields are handed to its
/// factory unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StoreSettings {
    pub fn memory() -> Self {
        Self {
            kind: "memory".to_string(),
            options: Map::new(),
        }
    }

    pub fn local(root: impl AsRef<Path>) -> Self {
        Self::with_path("local", "root", root.as_ref())
    }

    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self::with_path("sqlite", "path", path.as_ref())
    }

    fn with_path(kind: &str, field: &str, path: &Path) -> Self {
        let mut options = Map::new();
        options.insert(
            field.to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        Self {
            kind: kind.to_string(),
            options,
        }
    }

    /// Options as the JSON object store factories expect.
    pub fn options_value(&self) -> Value {
        Value::Object(self.options.clone())
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::sqlite(default_data_dir().join("messages.db"))
    }
}

/// Where the master key is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Base64 key in an environment variable.
    Env(String),
    /// Base64 key in a file.
    File(PathBuf),
}

impl KeySource {
    pub fn provider(&self) -> Box<dyn MasterKeyProvider> {
        match self {
            KeySource::Env(var) => Box::new(EnvKeyProvider::new(var.clone())),
            KeySource::File(path) => Box::new(FileKeyProvider::new(path)),
        }
    }
}

impl Default for KeySource {
    fn default() -> Self {
        KeySource::Env(DEFAULT_KEY_ENV.to_string())
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: SocketAddr,
    /// Record store backend.
    pub store: StoreSettings,
    /// Master key location.
    pub key_source: KeySource,
    /// Seconds between expiry sweeps; 0 disables the sweeper.
    pub sweep_interval_secs: u64,
    /// Length of generated retrieval keys.
    pub key_length: usize,
    /// Conditional inserts attempted before a collision is escalated.
    pub max_create_attempts: u32,
    /// Upper bound on a single record store call, in milliseconds.
    pub store_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let store = MessageStoreConfig::default();
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5001)),
            store: StoreSettings::default(),
            key_source: KeySource::default(),
            sweep_interval_secs: 300,
            key_length: store.key_length,
            max_create_attempts: store.max_create_attempts,
            store_timeout_ms: store.store_timeout.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for the message store.
    pub fn message_store_config(&self) -> MessageStoreConfig {
        MessageStoreConfig::default()
            .with_key_length(self.key_length)
            .with_max_create_attempts(self.max_create_attempts)
            .with_store_timeout(Duration::from_millis(self.store_timeout_ms))
    }

    /// Sweep period, if the sweeper is enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.kind.is_empty() {
            return Err(Error::Config("store.type must not be empty".to_string()));
        }
        self.message_store_config().validate()
    }
}

/// Platform data directory for dadpass, or `./dadpass-data` without one.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dadpass"))
        .unwrap_or_else(|| PathBuf::from("dadpass-data"))
}
