//! In-memory key store
//!
//! Backs the authority's unit tests and embedders that don't need records to
//! survive a restart. Same trait surface and id assignment as `FileStore`,
//! minus the disk writes.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::record::KeyRecord;
use crate::store::{BoxFuture, KeyStore};

/// Key store holding records in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, KeyRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing id assignment. Test setup helper.
    pub async fn insert(&self, record: KeyRecord) {
        let mut state = self.state.lock().await;
        state.insert(record.id.clone(), record);
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

impl KeyStore for MemoryStore {
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
            Ok(record)
        })
    }

    fn save<'a>(&'a self, record: &'a KeyRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(record.id.clone(), record.clone());
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
