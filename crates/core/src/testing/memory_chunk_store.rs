//! In-memory chunk store for testing.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::chunks::{ChunkError, ChunkRecord, ChunkStore};

/// A write the store accepted, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub title_id: String,
    pub index: u32,
    pub size: usize,
}

#[derive(Debug, Clone)]
struct StoredChunk {
    size: usize,
    data: Option<Vec<u8>>,
}

/// Mock implementation of the ChunkStore trait.
///
/// Provides controllable behavior for testing:
/// - Inject a write failure at a given chunk index
/// - Discard payloads and keep only sizes, for very large installs
/// - Inspect the order of accepted writes
#[derive(Debug, Clone, Default)]
pub struct MemoryChunkStore {
    chunks: Arc<RwLock<BTreeMap<(String, u32), StoredChunk>>>,
    writes: Arc<RwLock<Vec<RecordedWrite>>>,
    fail_at: Arc<RwLock<Option<u32>>>,
    discard: bool,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that keeps chunk sizes but drops their bytes.
    ///
    /// `get` returns an empty payload for discarded chunks.
    pub fn discarding() -> Self {
        Self {
            discard: true,
            ..Self::default()
        }
    }

    /// Reject every write of chunk `index` from now on.
    pub async fn fail_at(&self, index: u32) {
        *self.fail_at.write().await = Some(index);
    }

    /// Stop injecting failures.
    pub async fn clear_failure(&self) {
        *self.fail_at.write().await = None;
    }

    /// Every accepted write, in order.
    pub async fn recorded_writes(&self) -> Vec<RecordedWrite> {
        self.writes.read().await.clone()
    }

    /// Sizes of the chunks currently stored for `title_id`, by index.
    pub async fn chunk_sizes(&self, title_id: &str) -> Vec<(u32, usize)> {
        self.chunks
            .read()
            .await
            .iter()
            .filter(|((id, _), _)| id == title_id)
            .map(|((_, index), chunk)| (*index, chunk.size))
            .collect()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, title_id: &str, index: u32, data: Vec<u8>) -> Result<(), ChunkError> {
        if *self.fail_at.read().await == Some(index) {
            return Err(ChunkError::Rejected(format!(
                "injected failure at part {}",
                index
            )));
        }

        let size = data.len();
        let stored = StoredChunk {
            size,
            data: if self.discard { None } else { Some(data) },
        };
        self.chunks
            .write()
            .await
            .insert((title_id.to_string(), index), stored);
        self.writes.write().await.push(RecordedWrite {
            title_id: title_id.to_string(),
            index,
            size,
        });
        Ok(())
    }

    async fn get(&self, title_id: &str, index: u32) -> Result<Option<ChunkRecord>, ChunkError> {
        let chunks = self.chunks.read().await;
        Ok(chunks
            .get(&(title_id.to_string(), index))
            .map(|chunk| ChunkRecord {
                title_id: title_id.to_string(),
                index,
                data: chunk.data.clone().unwrap_or_default(),
                written_at: Utc::now(),
            }))
    }

    async fn delete_all(&self, title_id: &str) -> Result<u64, ChunkError> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|(id, _), _| id != title_id);
        Ok((before - chunks.len()) as u64)
    }

    async fn count(&self, title_id: &str) -> Result<u64, ChunkError> {
        let chunks = self.chunks.read().await;
        Ok(chunks.keys().filter(|(id, _)| id == title_id).count() as u64)
    }

    async fn total_count(&self) -> Result<u64, ChunkError> {
        Ok(self.chunks.read().await.len() as u64)
    }

    async fn title_ids(&self) -> Result<Vec<String>, ChunkError> {
        let mut ids: Vec<String> = self
            .chunks
            .read()
            .await
            .keys()
            .map(|(id, _)| id.clone())
            .collect();
        ids.dedup();
        Ok(ids)
    }

    async fn clear(&self) -> Result<(), ChunkError> {
        self.chunks.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryChunkStore::new();
        store.fail_at(1).await;

        store.put("t", 0, vec![1]).await.unwrap();
        let err = store.put("t", 1, vec![2]).await.unwrap_err();
        assert!(matches!(err, ChunkError::Rejected(_)));
        assert_eq!(store.count("t").await.unwrap(), 1);

        store.clear_failure().await;
        store.put("t", 1, vec![2]).await.unwrap();
        assert_eq!(store.count("t").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_discarding_keeps_sizes() {
        let store = MemoryChunkStore::discarding();
        store.put("t", 0, vec![7; 10]).await.unwrap();

        assert_eq!(store.chunk_sizes("t").await, vec![(0, 10)]);
        let chunk = store.get("t", 0).await.unwrap().unwrap();
        assert!(chunk.data.is_empty());
    }
}
