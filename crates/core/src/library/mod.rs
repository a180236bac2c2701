//! The title library: install, list, play and remove.

mod assembler;
mod error;
mod facade;
mod stats;

pub use assembler::{AssembledImage, RetrievalAssembler};
pub use error::{AssemblyError, LibraryError};
pub use facade::{Library, PlayOutcome};
pub use stats::LibraryStats;

use std::sync::Arc;

use tracing::info;

use crate::catalog::{CatalogStore, SqliteCatalogStore};
use crate::chunks::{ChunkError, ChunkStore, FsChunkStore, SqliteChunkStore};
use crate::config::{StorageBackend, StorageConfig};

/// Store handles backing a [`Library`].
pub struct Stores {
    pub chunks: Arc<dyn ChunkStore>,
    pub catalog: Arc<dyn CatalogStore>,
}

/// Open the chunk store and catalog described by `config`.
///
/// The catalog always lives in the SQLite database; chunks go either into the
/// same database or into files under `chunk_dir`.
pub async fn open_stores(config: &StorageConfig) -> Result<Stores, LibraryError> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChunkError::io(parent, e))?;
        }
    }

    let catalog: Arc<dyn CatalogStore> =
        Arc::new(SqliteCatalogStore::new(&config.database_path)?);
    let chunks: Arc<dyn ChunkStore> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteChunkStore::new(&config.database_path)?),
        StorageBackend::Fs => Arc::new(FsChunkStore::new(config.chunk_dir.clone()).await?),
    };

    info!(
        backend = chunks.name(),
        database = %config.database_path.display(),
        "Opened library stores"
    );
    Ok(Stores { chunks, catalog })
}
