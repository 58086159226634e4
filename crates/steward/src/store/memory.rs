//! In-memory secret store

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use certsteward_common::StoreKey;

use super::{FieldMap, SecretStore, StoreError};

/// Secret store backed by a map, counting writes
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<StoreKey, FieldMap>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write
    pub fn insert(&self, key: StoreKey, fields: FieldMap) {
        self.records.lock().insert(key, fields);
    }

    /// Snapshot of the record under `key`
    pub fn get(&self, key: &StoreKey) -> Option<FieldMap> {
        self.records.lock().get(key).cloned()
    }

    /// Number of writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn read(&self, key: &StoreKey) -> Result<Option<FieldMap>, StoreError> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn write(&self, key: &StoreKey, fields: &FieldMap) -> Result<(), StoreError> {
        self.records.lock().insert(key.clone(), fields.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::string_fields;

    #[tokio::test]
    async fn test_write_replaces_and_counts() {
        let store = MemoryStore::new();
        let key = StoreKey::key();

        store.insert(key.clone(), string_fields([("old", "x")]));
        assert_eq!(store.write_count(), 0);

        store
            .write(&key, &string_fields([("pem", "y")]))
            .await
            .unwrap();

        let fields = store.read(&key).await.unwrap().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["pem"], "y");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new();
        assert!(store.read(&StoreKey::account()).await.unwrap().is_none());
    }
}
