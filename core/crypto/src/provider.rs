//! Master key providers.
//!
//! The key is fetched exactly once at startup. A provider failure is fatal
//! to the process; there is no fallback key.

use std::path::{Path, PathBuf};
use tracing::{error, info};
use zeroize::Zeroizing;

use crate::keys::MasterKey;
use dadpass_common::{Error, Result};

/// Environment variable consulted by [`EnvKeyProvider::default`].
pub const DEFAULT_KEY_ENV: &str = "DADPASS_MASTER_KEY";

/// Source of the process master key.
pub trait MasterKeyProvider: Send + Sync {
    /// Human-readable description of where the key comes from.
    fn source(&self) -> String;

    /// Load the 32-byte master key.
    fn load_master_key(&self) -> Result<MasterKey>;
}

/// Reads a base64 key from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_ENV)
    }
}

impl MasterKeyProvider for EnvKeyProvider {
    fn source(&self) -> String {
        format!("env:{}", self.var)
    }

    fn load_master_key(&self) -> Result<MasterKey> {
        let value = Zeroizing::new(std::env::var(&self.var).map_err(|_| {
            error!(var = %self.var, "Master key environment variable not set");
            Error::Config(format!("Environment variable {} is not set", self.var))
        })?);
        let key = decode_key(&value, &self.source())?;
        info!(source = %self.source(), "Master encryption key loaded");
        Ok(key)
    }
}

/// Decode a provider value; malformed input is a `Config` error.
fn decode_key(encoded: &str, source: &str) -> Result<MasterKey> {
    MasterKey::from_base64(encoded).map_err(|e| {
        error!(source, "Master key is malformed");
        Error::Config(format!("Invalid master key from {}: {}", source, e))
    })
}

/// Reads a base64 key from a file.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MasterKeyProvider for FileKeyProvider {
    fn source(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load_master_key(&self) -> Result<MasterKey> {
        let contents = Zeroizing::new(std::fs::read_to_string(&self.path).map_err(|e| {
            error!(path = %self.path.display(), "Failed to read master key file");
            Error::Config(format!(
                "Cannot read key file {}: {}",
                self.path.display(),
                e
            ))
        })?);
        let key = decode_key(&contents, &self.source())?;
        info!(source = %self.source(), "Master encryption key loaded");
        Ok(key)
    }
}
