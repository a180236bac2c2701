//! Chunk store - durable keyed storage for title payload slices.
//!
//! Chunks are addressed by `(title_id, index)`. Small titles keep their whole
//! payload at index 0; chunked titles use indices `0..total_chunks`.

mod error;
mod fs_store;
mod sqlite;

pub use error::ChunkError;
pub use fs_store::FsChunkStore;
pub use sqlite::SqliteChunkStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One stored slice of a title's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub title_id: String,
    pub index: u32,
    pub data: Vec<u8>,
    pub written_at: DateTime<Utc>,
}

/// Trait for chunk storage backends.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Write a chunk. Once this returns `Ok`, the chunk survives process exit.
    /// Writing an existing key replaces it.
    async fn put(&self, title_id: &str, index: u32, data: Vec<u8>) -> Result<(), ChunkError>;

    /// Read a chunk, or `None` if it does not exist.
    async fn get(&self, title_id: &str, index: u32) -> Result<Option<ChunkRecord>, ChunkError>;

    /// Delete every chunk of a title. Returns how many were removed.
    async fn delete_all(&self, title_id: &str) -> Result<u64, ChunkError>;

    /// Number of chunks stored for a title.
    async fn count(&self, title_id: &str) -> Result<u64, ChunkError>;

    /// Total number of chunks across all titles.
    async fn total_count(&self) -> Result<u64, ChunkError>;

    /// Ids of every title with at least one stored chunk, sorted.
    async fn title_ids(&self) -> Result<Vec<String>, ChunkError>;

    /// Delete every chunk.
    async fn clear(&self) -> Result<(), ChunkError>;

    /// Flush pending writes before shutdown.
    async fn flush(&self) -> Result<(), ChunkError> {
        Ok(())
    }
}
