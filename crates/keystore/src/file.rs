//! File-backed key store
//!
//! Persists key records as a JSON file mapping id to record. All writes use
//! atomic temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes writers; queries clone out of the in-memory map so they don't
//! block behind a write in progress for long.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::record::KeyRecord;
use crate::store::{BoxFuture, KeyStore};

/// Key store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, KeyRecord>>,
}

impl FileStore {
    /// Load records from the given file path.
    ///
    /// A missing file is created as `{}` so the service can cold-start with
    /// zero keys and have them registered later.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Io(format!("reading key file: {e}")))?;
            let records: HashMap<String, KeyRecord> = serde_json::from_str(&contents)
                .map_err(|e| StoreError::Parse(format!("parsing key file: {e}")))?;
            info!(path = %path.display(), keys = records.len(), "loaded key records");
            records
        } else {
            info!(path = %path.display(), "key file not found, starting with empty store");
            let records = HashMap::new();
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl KeyStore for FileStore {
    fn find_eligible(&self, now_millis: u64) -> BoxFuture<'_, Result<Vec<KeyRecord>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .values()
                .filter(|r| r.is_eligible(now_millis))
                .cloned()
                .collect())
        })
    }

    fn find_by_secret<'a>(&'a self, secret: &'a str) -> BoxFuture<'a, Result<Option<KeyRecord>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.values().find(|r| r.secret == secret).cloned())
        })
    }

    fn create<'a>(&'a self, secret: &'a str) -> BoxFuture<'a, Result<KeyRecord>> {
        Box::pin(async move {
            let record = KeyRecord::new(
                format!("key_{}", uuid::Uuid::new_v4().as_simple()),
                secret.to_string(),
            );
            let mut state = self.state.lock().await;
            state.insert(record.id.clone(), record.clone());
            write_atomic(&self.path, &state).await?;
            debug!(key_id = %record.id, "created key record");
            Ok(record)
        })
    }

    fn save<'a>(&'a self, record: &'a KeyRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(record.id.clone(), record.clone());
            write_atomic(&self.path, &state).await?;
            debug!(key_id = %record.id, "saved key record");
            Ok(())
        })
    }

    fn find_all(&self) -> BoxFuture<'_, Result<Vec<KeyRecord>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.values().cloned().collect())
        })
    }
}

/// Write the record map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over the
/// target so a crash mid-write can't leave a truncated file. Permissions are
/// set to 0600 since the file contains credential values.
async fn write_atomic(path: &Path, data: &HashMap<String, KeyRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StoreError::Parse(format!("serializing key records: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("key file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".keys.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp key file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting key file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp key file: {e}")))?;

    debug!(path = %path.display(), "persisted key records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_at(dir: &tempfile::TempDir) -> FileStore {
        FileStore::load(dir.path().join("keys.json")).await.unwrap()
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let store = FileStore::load(path.clone()).await.unwrap();
        let mut record = store.create("sk-roundtrip").await.unwrap();
        record.failure_count = 2;
        record.last_used = Some(1_700_000_000_000);
        store.save(&record).await.unwrap();

        let store2 = FileStore::load(path).await.unwrap();
        let found = store2.find_by_secret("sk-roundtrip").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.failure_count, 2);
        assert_eq!(found.last_used, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        assert!(!path.exists());
        let store = FileStore::load(path.clone()).await.unwrap();
        assert!(store.is_empty().await);
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, KeyRecord> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn create_assigns_fresh_id_and_default_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir).await;

        let a = store.create("sk-a").await.unwrap();
        let b = store.create("sk-b").await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.is_active);
        assert_eq!(a.failure_count, 0);
        assert!(a.last_used.is_none());
        assert!(a.rate_limit_reset_at.is_none());
    }

    #[tokio::test]
    async fn find_eligible_applies_cooldown_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir).await;

        let mut cooling = store.create("sk-cooling").await.unwrap();
        cooling.rate_limit_reset_at = Some(5_000);
        store.save(&cooling).await.unwrap();

        let mut disabled = store.create("sk-disabled").await.unwrap();
        disabled.is_active = false;
        store.save(&disabled).await.unwrap();

        assert!(store.find_eligible(4_999).await.unwrap().is_empty());

        // Reset time reached: only the cooling key comes back
        let eligible = store.find_eligible(5_000).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, cooling.id);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = FileStore::load(path.clone()).await.unwrap();
        store.create("sk-perm").await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "key file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = FileStore::load(path).await.unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)), "got: {err}");
    }

    #[tokio::test]
    async fn concurrent_creates_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = std::sync::Arc::new(FileStore::load(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&format!("sk-{i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.len().await, 10);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, KeyRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }
}
