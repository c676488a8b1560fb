//! Master key with secure memory handling.
//!
//! The key zeroizes its memory on drop to prevent sensitive data from
//! persisting in memory.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use dadpass_common::{Error, Result, SensitiveBytes};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Process-wide symmetric key used to encrypt every stored message.
///
/// Loaded once at startup and held for the process lifetime. There is no
/// rotation inside a running process.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a master key from a byte slice.
    ///
    /// # Errors
    /// - Returns `Crypto` if the slice is not exactly KEY_LENGTH bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(Error::Crypto(format!(
                "Invalid master key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Decode a master key from its base64 text form.
    ///
    /// Accepts standard and URL-safe alphabets, with or without padding,
    /// and ignores surrounding whitespace.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let decoded = [URL_SAFE, URL_SAFE_NO_PAD, STANDARD, STANDARD_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(encoded).ok())
            .map(SensitiveBytes::new)
            .ok_or_else(|| Error::Crypto("Master key is not valid base64".to_string()))?;
        Self::from_slice(decoded.as_bytes())
    }

    /// Encode the key as padded URL-safe base64.
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.key)
    }

    /// Generate a random master key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}
