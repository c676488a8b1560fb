//! Envelope encryption of message payloads.
//!
//! A token is self-contained and transport-safe:
//!
//! ```text
//! base64url_nopad( version:u8 | issued_at:u64be | nonce:24 | ciphertext | tag:16 )
//! ```
//!
//! The version byte and timestamp are bound as associated data, so editing
//! the header fails authentication just like editing the ciphertext does.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;

use crate::aead::{self, NONCE_SIZE, TAG_SIZE};
use crate::keys::MasterKey;
use dadpass_common::{Error, Result};

/// Current token format version.
pub const TOKEN_VERSION: u8 = 0x01;

const HEADER_SIZE: usize = 1 + 8;

/// Encrypts and decrypts payloads under the process master key.
///
/// Stateless apart from the key; safe to share across tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EnvelopeCipher {
    key: MasterKey,
}

impl EnvelopeCipher {
    /// Wrap a master key.
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` into a fresh token.
    ///
    /// Two calls with the same input never yield the same token: every call
    /// draws a new random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let issued_at = Utc::now().timestamp().max(0) as u64;
        let header = header(TOKEN_VERSION, issued_at);

        let sealed = aead::seal(self.key.as_bytes(), &header, plaintext)?;

        let mut raw = Vec::with_capacity(HEADER_SIZE + sealed.len());
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Verify and decrypt a token.
    ///
    /// # Errors
    /// - `Crypto` if the token is malformed, carries an unknown version or
    ///   fails authentication. No plaintext is returned on failure.
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>> {
        let raw = decode(token)?;
        let (header, sealed) = raw.split_at(HEADER_SIZE);
        aead::open(self.key.as_bytes(), header, sealed)
    }

    /// Unix timestamp embedded in a token, without decrypting it.
    ///
    /// The value is unauthenticated until [`EnvelopeCipher::decrypt`] succeeds.
    pub fn issued_at(token: &str) -> Result<i64> {
        let raw = decode(token)?;
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[1..HEADER_SIZE]);
        Ok(u64::from_be_bytes(ts) as i64)
    }
}

fn header(version: u8, issued_at: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = version;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());
    header
}

/// Decode and structurally check a token.
fn decode(token: &str) -> Result<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| Error::Crypto("Malformed token".to_string()))?;

    if raw.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto("Malformed token".to_string()));
    }
    if raw[0] != TOKEN_VERSION {
        return Err(Error::Crypto(format!(
            "Unknown token version: {}",
            raw[0]
        )));
    }
    Ok(raw)
}
