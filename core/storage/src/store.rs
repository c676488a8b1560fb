//! Record store trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dadpass_common::{MessageKey, Result, TtlOption};

/// One row per live secret.
///
/// Serialized field names match the stored table attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Primary lookup key.
    #[serde(rename = "messageKey")]
    pub key: MessageKey,
    /// Envelope token over the plaintext.
    #[serde(rename = "encryptedMessage")]
    pub ciphertext: String,
    /// Lifetime the caller picked, kept for display.
    #[serde(rename = "ttlOption")]
    pub ttl_option: TtlOption,
    /// Absolute expiry, Unix seconds.
    #[serde(rename = "ttl")]
    pub expires_at: i64,
}

impl StoredMessage {
    /// A record is expired once the clock has moved past `expires_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// Keyed record store with conditional-write semantics.
///
/// Implementations must make `insert_if_absent` and `take` atomic with
/// respect to concurrent callers on the same key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the backend name (e.g., "memory", "local", "sqlite").
    fn name(&self) -> &str;

    /// Fetch a record without consuming it.
    async fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>>;

    /// Insert only if no record exists for `record.key`.
    ///
    /// # Errors
    /// - `KeyCollision` if the key is already present
    /// - `Storage` on backend failure
    async fn insert_if_absent(&self, record: &StoredMessage) -> Result<()>;

    /// Remove a record. Deleting an absent key is not an error.
    async fn delete(&self, key: &MessageKey) -> Result<()>;

    /// Remove a record and return what was removed.
    ///
    /// The default is `get` followed by `delete`, which leaves a window where
    /// two racing callers can both observe the record. Every bundled backend
    /// overrides this with an atomic primitive.
    async fn take(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        let record = self.get(key).await?;
        if record.is_some() {
            self.delete(key).await?;
        }
        Ok(record)
    }

    /// Best-effort removal of records that expired before `now`.
    ///
    /// Returns the number of records removed.
    async fn purge_expired(&self, now: i64) -> Result<usize>;
}
