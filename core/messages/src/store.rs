//! The one-time-read message protocol.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::MessageStoreConfig;
use crate::keygen::generate_key;
use dadpass_common::{Error, MessageKey, Result, TtlOption};
use dadpass_crypto::EnvelopeCipher;
use dadpass_storage::{RecordStore, StoredMessage};

/// A message handed back by a successful read.
#[derive(Clone, PartialEq, Eq)]
pub struct RetrievedMessage {
    /// Decrypted plaintext.
    pub message: String,
    /// Lifetime the creator picked.
    pub ttl_option: TtlOption,
}

impl fmt::Debug for RetrievedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedMessage")
            .field("message", &"[REDACTED]")
            .field("ttl_option", &self.ttl_option)
            .finish()
    }
}

/// Point-in-time copy of the store's outcome counters.
///
/// Every read that does not deliver lands in exactly one of `expired`,
/// `missing` or `undecryptable`. Callers only ever see "not available".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub created: u64,
    pub delivered: u64,
    pub expired: u64,
    pub missing: u64,
    pub undecryptable: u64,
    pub collisions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    delivered: AtomicU64,
    expired: AtomicU64,
    missing: AtomicU64,
    undecryptable: AtomicU64,
    collisions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Creates and consumes one-time-read messages.
///
/// Holds no mutable state besides counters; uniqueness and exactly-once
/// delivery are delegated to the record store's atomic primitives.
pub struct MessageStore {
    cipher: Arc<EnvelopeCipher>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: MessageStoreConfig,
    counters: Counters,
}

impl MessageStore {
    /// Build a store on the system clock.
    ///
    /// # Errors
    /// - `Config` if `config` fails validation
    pub fn new(
        cipher: EnvelopeCipher,
        records: Arc<dyn RecordStore>,
        config: MessageStoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cipher: Arc::new(cipher),
            records,
            clock: Arc::new(SystemClock),
            config,
            counters: Counters::default(),
        })
    }

    /// Replace the clock used for TTL decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &MessageStoreConfig {
        &self.config
    }

    /// Name of the backing record store.
    pub fn backend(&self) -> &str {
        self.records.name()
    }

    /// Store a new message and return its retrieval key.
    ///
    /// An empty message is legal; a missing one is not. Unknown TTL
    /// selections fall back to the default without error.
    ///
    /// # Errors
    /// - `Validation` if `message` is `None`; nothing is written
    /// - `Crypto` if encryption fails
    /// - `Storage` on store failure, timeout, or when every attempt collided
    pub async fn create(
        &self,
        message: Option<&str>,
        ttl_option: Option<&str>,
    ) -> Result<MessageKey> {
        let message =
            message.ok_or_else(|| Error::Validation("Message is required".to_string()))?;

        let ttl_option = TtlOption::resolve(ttl_option);
        let expires_at = self.clock.now() + ttl_option.duration_secs();
        let ciphertext = self.cipher.encrypt(message.as_bytes()).map_err(|e| {
            error!(error = %e, "Failed to encrypt message");
            e
        })?;

        for attempt in 1..=self.config.max_create_attempts {
            let record = StoredMessage {
                key: generate_key(self.config.key_length)?,
                ciphertext: ciphertext.clone(),
                ttl_option,
                expires_at,
            };

            match self
                .timed("insert", self.records.insert_if_absent(&record))
                .await
            {
                Ok(()) => {
                    bump(&self.counters.created);
                    debug!(%ttl_option, attempt, "Message created");
                    return Ok(record.key);
                }
                Err(Error::KeyCollision(_)) => {
                    bump(&self.counters.collisions);
                    warn!(attempt, "Key collision detected, retrying with a fresh key");
                }
                Err(e) => {
                    error!(error = %e, "Failed to store message");
                    return Err(e);
                }
            }
        }

        error!(
            attempts = self.config.max_create_attempts,
            "Key collision persisted across every attempt"
        );
        Err(Error::Storage(format!(
            "Key collision persisted after {} attempts",
            self.config.max_create_attempts
        )))
    }

    /// Consume a message.
    ///
    /// Returns `Ok(None)` when the key is unknown, already consumed, expired,
    /// or its payload cannot be decrypted; these are deliberately
    /// indistinguishable. The record is removed before decryption, so a
    /// message is delivered at most once even under racing reads.
    ///
    /// # Errors
    /// - `Storage` when the store fails or times out. This means "unknown",
    ///   not "gone"; the record may or may not have been consumed.
    pub async fn read(&self, key: &str) -> Result<Option<RetrievedMessage>> {
        let key = match MessageKey::parse(key) {
            Ok(key) => key,
            Err(_) => {
                bump(&self.counters.missing);
                debug!("Rejected malformed message key");
                return Ok(None);
            }
        };

        let record = match self.timed("take", self.records.take(&key)).await? {
            Some(record) => record,
            None => {
                bump(&self.counters.missing);
                debug!("No live message for key");
                return Ok(None);
            }
        };

        if record.is_expired(self.clock.now()) {
            bump(&self.counters.expired);
            info!(expires_at = record.expires_at, "Expired message removed on read");
            return Ok(None);
        }

        match self.decrypt(&record) {
            Ok(message) => {
                bump(&self.counters.delivered);
                debug!(ttl_option = %record.ttl_option, "Message delivered");
                Ok(Some(RetrievedMessage {
                    message,
                    ttl_option: record.ttl_option,
                }))
            }
            Err(e) => {
                // Already deleted; the payload is unrecoverable.
                bump(&self.counters.undecryptable);
                error!(error = %e, "Message consumed but could not be decrypted");
                Ok(None)
            }
        }
    }

    /// Remove expired records through the store's native sweep.
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self
            .timed("purge", self.records.purge_expired(self.clock.now()))
            .await?;
        if purged > 0 {
            info!(purged, backend = self.backend(), "Purged expired messages");
        }
        Ok(purged)
    }

    /// Snapshot of the outcome counters.
    pub fn stats(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            created: load(&self.counters.created),
            delivered: load(&self.counters.delivered),
            expired: load(&self.counters.expired),
            missing: load(&self.counters.missing),
            undecryptable: load(&self.counters.undecryptable),
            collisions: load(&self.counters.collisions),
        }
    }

    fn decrypt(&self, record: &StoredMessage) -> Result<String> {
        let plaintext = self.cipher.decrypt(&record.ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::Crypto("Decrypted payload is not UTF-8".to_string()))
    }

    /// Bound a store call by the configured timeout.
    async fn timed<T>(&self, op: &'static str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout = ?self.config.store_timeout, "Record store call timed out");
                Err(Error::Storage(format!("Record store {} timed out", op)))
            }
        }
    }
}
