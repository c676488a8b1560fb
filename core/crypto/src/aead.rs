//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305,
};

use crate::keys::KEY_LENGTH;
use dadpass_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &[u8]) -> Result<XChaCha20Poly1305> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(XChaCha20Poly1305::new(GenericArray::from_slice(key)))
}

/// Encrypt plaintext, binding `aad` to the result.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated
/// - Output length is plaintext length + NONCE_SIZE + TAG_SIZE
///
/// # Errors
/// - Returns error if key length is incorrect
/// - Returns error if encryption fails
pub fn seal(key: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt the output of [`seal`] under the same key and `aad`.
///
/// # Errors
/// - Returns error if key length is incorrect
/// - Returns error if input is shorter than NONCE_SIZE + TAG_SIZE
/// - Returns error if authentication fails (tampered data or wrong aad)
pub fn open(key: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: encrypted, aad })
        .map_err(|_| Error::Crypto("Decryption failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let sealed = seal(&key, b"header", b"Hello, World!").unwrap();
        let opened = open(&key, b"header", &sealed).unwrap();
        assert_eq!(opened, b"Hello, World!");
    }

    #[test]
    fn test_sealed_size() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Test message";
        let sealed = seal(&key, b"", plaintext).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = [42u8; KEY_LENGTH];
        let ct1 = seal(&key, b"", b"Same plaintext").unwrap();
        let ct2 = seal(&key, b"", b"Same plaintext").unwrap();
        assert_ne!(&ct1[..NONCE_SIZE], &ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&[1u8; KEY_LENGTH], b"", b"Secret data").unwrap();
        assert!(open(&[2u8; KEY_LENGTH], b"", &sealed).is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [7u8; KEY_LENGTH];
        let sealed = seal(&key, b"v1", b"Secret data").unwrap();
        assert!(open(&key, b"v2", &sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_LENGTH];
        let mut sealed = seal(&key, b"", b"Important data").unwrap();
        sealed[NONCE_SIZE + 5] ^= 0xFF;
        assert!(open(&key, b"", &sealed).is_err());
    }

    #[test]
    fn test_truncated_input_fails() {
        let key = [42u8; KEY_LENGTH];
        assert!(open(&key, b"", &[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(seal(&[0u8; 16], b"", b"data").is_err());
    }
}
