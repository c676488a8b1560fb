//! SQLite record store.
//!
//! Embedded alternative to a managed table. The primary key constraint gives
//! conditional insert and `DELETE ... RETURNING` gives an atomic take.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::store::{RecordStore, StoredMessage};
use dadpass_common::{Error, MessageKey, Result, TtlOption};

/// Raw row as read back from SQLite: (ciphertext, ttl option, expiry).
type Row = (String, String, i64);

/// SQLite-backed record store.
///
/// The connection sits behind a mutex and every statement runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open a database file.
    ///
    /// # Errors
    /// - Parent directory cannot be created
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).map_err(sqlite_error)?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                message_key TEXT PRIMARY KEY,
                encrypted_message TEXT NOT NULL,
                ttl_option TEXT NOT NULL,
                ttl INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_ttl ON messages(ttl);
            "#,
        )
        .map_err(sqlite_error)?;

        info!("SQLite record store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Storage("SQLite connection lock poisoned".to_string()))?;
            f(&conn).map_err(sqlite_error)
        })
        .await
        .map_err(|e| Error::Storage(format!("SQLite task failed: {}", e)))?
    }
}

fn sqlite_error(err: rusqlite::Error) -> Error {
    Error::Storage(format!("SQLite failure: {}", err))
}

fn to_record(key: &MessageKey, (ciphertext, ttl_option, expires_at): Row) -> Result<StoredMessage> {
    let ttl_option: TtlOption = ttl_option
        .parse()
        .map_err(|_| Error::Serialization(format!("Bad ttl_option in row: {}", ttl_option)))?;
    Ok(StoredMessage {
        key: key.clone(),
        ciphertext,
        ttl_option,
        expires_at,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        let k = key.as_str().to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT encrypted_message, ttl_option, ttl FROM messages WHERE message_key = ?1",
                    params![k],
                    |row| Ok::<Row, rusqlite::Error>((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await?;
        row.map(|row| to_record(key, row)).transpose()
    }

    async fn insert_if_absent(&self, record: &StoredMessage) -> Result<()> {
        let row = (
            record.key.as_str().to_string(),
            record.ciphertext.clone(),
            record.ttl_option.as_str(),
            record.expires_at,
        );
        let inserted = self
            .with_conn(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO messages (message_key, encrypted_message, ttl_option, ttl)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(message_key) DO NOTHING
                    "#,
                    params![row.0, row.1, row.2, row.3],
                )
            })
            .await?;

        if inserted == 0 {
            return Err(Error::KeyCollision(record.key.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, key: &MessageKey) -> Result<()> {
        let k = key.as_str().to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM messages WHERE message_key = ?1", params![k])
        })
        .await?;
        Ok(())
    }

    async fn take(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        let k = key.as_str().to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    r#"
                    DELETE FROM messages WHERE message_key = ?1
                    RETURNING encrypted_message, ttl_option, ttl
                    "#,
                    params![k],
                    |row| Ok::<Row, rusqlite::Error>((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await?;
        row.map(|row| to_record(key, row)).transpose()
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let purged = self
            .with_conn(move |conn| conn.execute("DELETE FROM messages WHERE ttl < ?1", params![now]))
            .await?;
        debug!(purged, "SQLite sweep finished");
        Ok(purged)
    }
}
