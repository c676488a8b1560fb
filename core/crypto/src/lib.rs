//! Cryptographic primitives for dadpass.
//!
//! This module provides:
//! - Authenticated encryption using XChaCha20-Poly1305
//! - The process-wide master key with automatic zeroization
//! - Envelope tokens: versioned, timestamped, base64url ciphertexts
//! - Master key providers (environment variable, key file)
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Decryption fails closed on any format or authentication error

pub mod aead;
pub mod envelope;
pub mod keys;
pub mod provider;

pub use aead::{open, seal};
pub use envelope::{EnvelopeCipher, TOKEN_VERSION};
pub use keys::{MasterKey, KEY_LENGTH};
pub use provider::{EnvKeyProvider, FileKeyProvider, MasterKeyProvider, DEFAULT_KEY_ENV};
