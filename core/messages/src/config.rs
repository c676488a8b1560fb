//! Message store configuration.

use std::time::Duration;

use dadpass_common::{Error, Result};

/// Default length of generated retrieval keys.
pub const DEFAULT_KEY_LENGTH: usize = 10;

/// Shortest key the store will generate.
pub const MIN_KEY_LENGTH: usize = 4;

/// Longest key the store will generate.
pub const MAX_KEY_LENGTH: usize = dadpass_common::types::MAX_KEY_LENGTH;

/// Tunables for [`MessageStore`](crate::MessageStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStoreConfig {
    /// Length of generated retrieval keys.
    pub key_length: usize,
    /// Conditional inserts attempted before a collision is escalated.
    pub max_create_attempts: u32,
    /// Upper bound on any single record store call.
    pub store_timeout: Duration,
}

impl MessageStoreConfig {
    /// Set the generated key length.
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    /// Set the collision retry bound.
    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts;
        self
    }

    /// Set the per-call store timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Check that every field is usable.
    ///
    /// # Errors
    /// - `Config` describing the first offending field
    pub fn validate(&self) -> Result<()> {
        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&self.key_length) {
            return Err(Error::Config(format!(
                "key_length must be between {} and {}, got {}",
                MIN_KEY_LENGTH, MAX_KEY_LENGTH, self.key_length
            )));
        }
        if self.max_create_attempts == 0 {
            return Err(Error::Config(
                "max_create_attempts must be at least 1".to_string(),
            ));
        }
        if self.store_timeout.is_zero() {
            return Err(Error::Config("store_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for MessageStoreConfig {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
            max_create_attempts: 3,
            store_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MessageStoreConfig::default();
        assert_eq!(config.key_length, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = MessageStoreConfig::default();
        assert!(base.clone().with_key_length(3).validate().is_err());
        assert!(base.clone().with_key_length(65).validate().is_err());
        assert!(base.clone().with_max_create_attempts(0).validate().is_err());
        assert!(base
            .with_store_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
