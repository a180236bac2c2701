//! File system chunk store.
//!
//! Layout: `<root>/<title_id>/<index>.chunk`. Each chunk is written to a
//! `.tmp` sibling, synced, then renamed into place, so a crash never leaves a
//! partially written chunk under its final name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ChunkError, ChunkRecord, ChunkStore};

const CHUNK_EXT: &str = "chunk";

/// File system based chunk store.
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, ChunkError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| ChunkError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn title_dir(&self, title_id: &str) -> Result<PathBuf, ChunkError> {
        let valid = !title_id.is_empty()
            && title_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ChunkError::InvalidKey(title_id.to_string()));
        }
        Ok(self.root.join(title_id))
    }

    fn chunk_path(dir: &Path, index: u32) -> PathBuf {
        dir.join(format!("{:08}.{}", index, CHUNK_EXT))
    }

    async fn count_chunks(dir: &Path) -> Result<u64, ChunkError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ChunkError::io(dir, e)),
        };

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChunkError::io(dir, e))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(CHUNK_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn sync_dir(dir: &Path) -> Result<(), ChunkError> {
        // Directory fsync makes the rename durable. Not supported everywhere.
        #[cfg(unix)]
        {
            let handle = File::open(dir).await.map_err(|e| ChunkError::io(dir, e))?;
            handle.sync_all().await.map_err(|e| ChunkError::io(dir, e))?;
        }
        #[cfg(not(unix))]
        let _ = dir;
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for FsChunkStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn put(&self, title_id: &str, index: u32, data: Vec<u8>) -> Result<(), ChunkError> {
        let dir = self.title_dir(title_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ChunkError::io(&dir, e))?;

        let path = Self::chunk_path(&dir, index);
        let tmp_path = path.with_extension(format!("{}.tmp", CHUNK_EXT));

        let mut file = File::create(&tmp_path)
            .await
            .map_err(|e| ChunkError::io(&tmp_path, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| ChunkError::io(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| ChunkError::io(&tmp_path, e))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ChunkError::io(&path, e));
        }
        Self::sync_dir(&dir).await?;

        debug!(title_id, index, bytes = data.len(), "Wrote chunk file");
        Ok(())
    }

    async fn get(&self, title_id: &str, index: u32) -> Result<Option<ChunkRecord>, ChunkError> {
        let dir = self.title_dir(title_id)?;
        let path = Self::chunk_path(&dir, index);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChunkError::io(&path, e)),
        };

        let written_at = fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| ChunkError::io(&path, e))?;

        Ok(Some(ChunkRecord {
            title_id: title_id.to_string(),
            index,
            data,
            written_at,
        }))
    }

    async fn delete_all(&self, title_id: &str) -> Result<u64, ChunkError> {
        let dir = self.title_dir(title_id)?;
        let count = Self::count_chunks(&dir).await?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(ChunkError::io(&dir, e)),
        }
    }

    async fn count(&self, title_id: &str) -> Result<u64, ChunkError> {
        let dir = self.title_dir(title_id)?;
        Self::count_chunks(&dir).await
    }

    async fn total_count(&self) -> Result<u64, ChunkError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?;

        let mut total = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?
        {
            let path = entry.path();
            if path.is_dir() {
                total += Self::count_chunks(&path).await?;
            }
        }
        Ok(total)
    }

    async fn title_ids(&self) -> Result<Vec<String>, ChunkError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if Self::count_chunks(&path).await? > 0 {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn clear(&self) -> Result<(), ChunkError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChunkError::io(&self.root, e))?
        {
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .await
                    .map_err(|e| ChunkError::io(&path, e))?;
            }
        }
        Ok(())
    }
}
