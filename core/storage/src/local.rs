//! Local filesystem record store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{RecordStore, StoredMessage};
use dadpass_common::{Error, MessageKey, Result};

const RECORD_EXTENSION: &str = "json";

/// Scratch files younger than this may still belong to a running call.
const DEFAULT_SCRATCH_GRACE: Duration = Duration::from_secs(600);

/// Local filesystem record store.
///
/// One JSON file per record under the root directory. Atomicity comes from
/// the filesystem:
/// - conditional insert writes a private temp file and hard-links it into
///   place, which fails if the target already exists
/// - take renames the record to a unique claim file; only one racing
///   rename can succeed
///
/// Both run on the blocking pool, so a caller that stops waiting cannot
/// strand a scratch file halfway. Scratch files left by a crash are removed
/// by `purge_expired` once older than the grace period.
pub struct LocalStore {
    root: PathBuf,
    scratch_grace: Duration,
}

impl LocalStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Invalid path
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self {
            root,
            scratch_grace: DEFAULT_SCRATCH_GRACE,
        })
    }

    /// Set how old a scratch file must be before a sweep removes it.
    pub fn with_scratch_grace(mut self, grace: Duration) -> Self {
        self.scratch_grace = grace;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are alphanumeric, so they are safe to use as file names.
    fn record_path(&self, key: &MessageKey) -> PathBuf {
        self.root
            .join(format!("{}.{}", key.as_str(), RECORD_EXTENSION))
    }

    /// Scratch files start with a dot so they never look like records.
    fn scratch_path(&self, kind: &str) -> PathBuf {
        self.root.join(format!(".{}-{}", kind, Uuid::new_v4()))
    }

    async fn read_record(path: &Path) -> Result<Option<StoredMessage>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn storage_error(err: std::io::Error) -> Error {
    Error::Storage(format!("Local store I/O failure: {}", err))
}

fn is_scratch(name: &str) -> bool {
    name.starts_with(".tmp-") || name.starts_with(".claim-")
}

/// Run filesystem steps that must not be split by cancellation.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Storage(format!("Local store task failed: {}", e)))?
}

#[async_trait]
impl RecordStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        Self::read_record(&self.record_path(key)).await
    }

    async fn insert_if_absent(&self, record: &StoredMessage) -> Result<()> {
        let target = self.record_path(&record.key);
        let temp = self.scratch_path("tmp");

        let bytes = serde_json::to_vec(record)?;
        let key = record.key.to_string();

        blocking(move || {
            let written = std::fs::write(&temp, &bytes);
            let linked = written.and_then(|()| std::fs::hard_link(&temp, &target));
            // Left behind only if removal itself fails; the sweep gets it later.
            if let Err(e) = std::fs::remove_file(&temp) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(error = %e, "Failed to remove temp record file");
                }
            }

            match linked {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::KeyCollision(key)),
                Err(e) => Err(storage_error(e)),
            }
        })
        .await
    }

    async fn delete(&self, key: &MessageKey) -> Result<()> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn take(&self, key: &MessageKey) -> Result<Option<StoredMessage>> {
        let path = self.record_path(key);
        let claim = self.scratch_path("claim");

        blocking(move || {
            match std::fs::rename(&path, &claim) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(storage_error(e)),
            }

            let bytes = std::fs::read(&claim);
            std::fs::remove_file(&claim).map_err(storage_error)?;
            let bytes = bytes.map_err(storage_error)?;
            Ok(Some(serde_json::from_slice(&bytes)?))
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut entries = fs::read_dir(&self.root).await.map_err(storage_error)?;
        let mut purged = 0;
        let mut scratch = 0;

        while let Some(entry) = entries.next_entry().await.map_err(storage_error)? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_scratch(&name) {
                if self.is_stale(&entry).await && fs::remove_file(&path).await.is_ok() {
                    scratch += 1;
                }
                continue;
            }

            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
                && !name.starts_with('.');
            if !is_record {
                continue;
            }

            let record = match Self::read_record(&path).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable record");
                    continue;
                }
            };

            if record.is_expired(now) {
                match fs::remove_file(&path).await {
                    Ok(()) => purged += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(storage_error(e)),
                }
            }
        }

        if scratch > 0 {
            warn!(scratch, "Removed abandoned scratch files");
        }
        debug!(purged, "Local store sweep finished");
        Ok(purged)
    }
}

impl LocalStore {
    async fn is_stale(&self, entry: &fs::DirEntry) -> bool {
        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        age >= self.scratch_grace
    }
}
