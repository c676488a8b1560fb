//! Common error types for dadpass.

use thiserror::Error;

/// Top-level error type for dadpass operations.
///
/// Expiry and absence are not errors: a read that finds nothing returns
/// `Ok(None)`. Everything here is either a caller fault or a server fault.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conditional insert found the key already taken.
    #[error("Key collision: {0}")]
    KeyCollision(String),

    /// Encryption or decryption failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Backing store unreachable, timed out or failed unexpectedly.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validation_is_client_error() {
        assert!(Error::Validation("missing".into()).is_client_error());
        assert!(!Error::Storage("down".into()).is_client_error());
        assert!(!Error::Crypto("bad tag".into()).is_client_error());
        assert!(!Error::KeyCollision("abc".into()).is_client_error());
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
