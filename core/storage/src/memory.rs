//! In-memory record store for testing and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::{RecordStore, StoredMessage};
use dadpass_common::{Error, MessageKey, Result};

type Table = HashMap<MessageKey, StoredMessage>;

/// In-memory record store.
///
/// All data is lost on drop. Conditional insert and take run under the
/// write lock, so both are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Table>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired or not.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>> {
        self.records
            .read()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>> {
        self.records
            .write()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn insert_if_absent(&self, record: &StoredMessage) -> Result<()> {
        let mut records = self.write()?;
        if records.contains_key(&record.key) {
            return Err(Error::KeyCollision(record.key.to_string()));
        }
        records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &MessageKey) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn take(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        Ok(self.write()?.remove(key))
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}
