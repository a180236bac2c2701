//! In-memory catalog store for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, CatalogStore, TitleRecord};

/// Mock implementation of the CatalogStore trait.
///
/// Writes can be made to fail, to exercise what happens when the catalog
/// rejects a record after its payload is already stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    records: Arc<RwLock<HashMap<String, TitleRecord>>>,
    reject_puts: Arc<RwLock<Option<String>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `put` with `reason` until [`accept_puts`](Self::accept_puts).
    pub async fn reject_puts(&self, reason: impl Into<String>) {
        *self.reject_puts.write().await = Some(reason.into());
    }

    pub async fn accept_puts(&self) {
        *self.reject_puts.write().await = None;
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn put(&self, record: &TitleRecord) -> Result<(), CatalogError> {
        if let Some(reason) = self.reject_puts.read().await.clone() {
            return Err(CatalogError::Database(reason));
        }
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TitleRecord>, CatalogError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<TitleRecord>, CatalogError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        match self.records.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(CatalogError::NotFound(id.to_string())),
        }
    }

    async fn clear(&self) -> Result<(), CatalogError> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::title_record;

    #[tokio::test]
    async fn test_rejected_put_stores_nothing() {
        let store = MemoryCatalogStore::new();
        store.reject_puts("disk full").await;

        let err = store.put(&title_record("t1", "A", 1)).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(store.list().await.unwrap().is_empty());

        store.accept_puts().await;
        store.put(&title_record("t1", "A", 1)).await.unwrap();
        assert!(store.get("t1").await.unwrap().is_some());
    }
}
