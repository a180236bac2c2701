//! Rebuilds a title's image from the chunk store.

use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::AssemblyError;
use crate::catalog::{CatalogStore, TitleRecord};
use crate::chunks::ChunkStore;
use crate::metrics;

/// A reconstructed image.
#[derive(Debug, Clone)]
pub struct AssembledImage {
    pub title_id: String,
    /// Name to present the image under.
    pub filename: String,
    pub data: Vec<u8>,
}

/// Reads a title's chunks back in order and verifies the result.
pub struct RetrievalAssembler {
    chunks: Arc<dyn ChunkStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl RetrievalAssembler {
    pub fn new(chunks: Arc<dyn ChunkStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { chunks, catalog }
    }

    /// Assemble the title with id `title_id`.
    pub async fn assemble(&self, title_id: &str) -> Result<AssembledImage, AssemblyError> {
        let record = self
            .catalog
            .get(title_id)
            .await?
            .ok_or_else(|| AssemblyError::NotFound(title_id.to_string()))?;
        self.assemble_record(&record).await
    }

    /// Assemble an already loaded record.
    pub async fn assemble_record(
        &self,
        record: &TitleRecord,
    ) -> Result<AssembledImage, AssemblyError> {
        let started = Instant::now();
        let result = self.read_and_verify(record).await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) if e.is_corrupt() => "corrupt",
            Err(_) => "error",
        };
        metrics::ASSEMBLIES_TOTAL.with_label_values(&[label]).inc();
        metrics::ASSEMBLY_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(title_id = %record.id, error = %e, "Assembly failed");
        }
        result
    }

    async fn read_and_verify(&self, record: &TitleRecord) -> Result<AssembledImage, AssemblyError> {
        let entry = record
            .stored_entry()
            .ok_or_else(|| AssemblyError::NoPayload(record.id.clone()))?;

        let data = if record.use_chunks {
            let info = entry
                .chunk_info
                .as_ref()
                .ok_or_else(|| AssemblyError::NoPayload(record.id.clone()))?;

            let mut data = Vec::with_capacity(entry.size as usize);
            for index in 0..info.total_chunks {
                let chunk = self.chunks.get(&record.id, index).await?.ok_or_else(|| {
                    AssemblyError::MissingChunk {
                        title_id: record.id.clone(),
                        index,
                    }
                })?;
                data.extend_from_slice(&chunk.data);
            }
            debug!(
                title_id = %record.id,
                chunks = info.total_chunks,
                bytes = data.len(),
                "Assembled chunked title"
            );
            data
        } else {
            self.chunks
                .get(&record.id, 0)
                .await?
                .ok_or_else(|| AssemblyError::MissingChunk {
                    title_id: record.id.clone(),
                    index: 0,
                })?
                .data
        };

        if data.len() as u64 != entry.size {
            return Err(AssemblyError::SizeMismatch {
                title_id: record.id.clone(),
                expected: entry.size,
                actual: data.len() as u64,
            });
        }

        let data = match &entry.sha256 {
            Some(expected) => {
                let (actual, data) = tokio::task::spawn_blocking(move || {
                    (format!("{:x}", Sha256::digest(&data)), data)
                })
                .await
                .map_err(|e| AssemblyError::Internal(e.to_string()))?;

                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(AssemblyError::ChecksumMismatch {
                        title_id: record.id.clone(),
                        expected: expected.clone(),
                        actual,
                    });
                }
                data
            }
            None => data,
        };

        Ok(AssembledImage {
            title_id: record.id.clone(),
            filename: record.display_filename().to_string(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ChunkBounds, ChunkInfo, FileEntry, FileType, SqliteCatalogStore};
    use crate::chunks::SqliteChunkStore;
    use chrono::Utc;

    fn chunked_record(id: &str, parts: &[&[u8]]) -> TitleRecord {
        let mut offset = 0u64;
        let mut bounds = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let len = part.len() as u64;
            bounds.push(ChunkBounds {
                index: i as u32,
                start: offset,
                end: offset + len,
                size: len,
            });
            offset += len;
        }
        let mut entry = FileEntry::new("game.bin", offset);
        entry.chunk_info = Some(ChunkInfo {
            title_id: id.to_string(),
            total_chunks: parts.len() as u32,
            chunk_size: parts[0].len() as u64,
            chunks: bounds,
        });
        entry.sha256 = Some(format!("{:x}", Sha256::digest(parts.concat())));

        TitleRecord {
            id: id.to_string(),
            name: "Game".to_string(),
            region: "PAL".to_string(),
            original_filename: "game.bin".to_string(),
            file_size: offset,
            file_type: FileType::Bin,
            files: vec![entry],
            installed_date: Utc::now(),
            last_played: None,
            play_count: 0,
            is_compressed: false,
            use_chunks: true,
            main_file_name: Some("game.bin".to_string()),
        }
    }

    async fn setup(
        record: &TitleRecord,
        parts: &[&[u8]],
    ) -> (RetrievalAssembler, Arc<SqliteChunkStore>) {
        let chunks = Arc::new(SqliteChunkStore::in_memory().unwrap());
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        for (i, part) in parts.iter().enumerate() {
            chunks.put(&record.id, i as u32, part.to_vec()).await.unwrap();
        }
        catalog.put(record).await.unwrap();
        (RetrievalAssembler::new(chunks.clone(), catalog), chunks)
    }

    #[tokio::test]
    async fn test_assembles_chunks_in_order() {
        let parts: [&[u8]; 3] = [b"aaaa", b"bbbb", b"cc"];
        let record = chunked_record("local_1", &parts);
        let (assembler, _) = setup(&record, &parts).await;

        let image = assembler.assemble("local_1").await.unwrap();
        assert_eq!(image.data, b"aaaabbbbcc");
        assert_eq!(image.filename, "game.bin");
    }

    #[tokio::test]
    async fn test_unknown_title() {
        let parts: [&[u8]; 1] = [b"x"];
        let record = chunked_record("local_1", &parts);
        let (assembler, _) = setup(&record, &parts).await;

        let result = assembler.assemble("local_2").await;
        assert!(matches!(result, Err(AssemblyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_chunk_is_reported() {
        let parts: [&[u8]; 3] = [b"aaaa", b"bbbb", b"cc"];
        let record = chunked_record("local_1", &parts);
        let (assembler, chunks) = setup(&record, &parts[..2]).await;
        assert_eq!(chunks.count("local_1").await.unwrap(), 2);

        let result = assembler.assemble("local_1").await;
        assert!(matches!(
            result,
            Err(AssemblyError::MissingChunk { index: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_tampered_chunk_fails_checksum() {
        let parts: [&[u8]; 2] = [b"aaaa", b"bbbb"];
        let record = chunked_record("local_1", &parts);
        let (assembler, chunks) = setup(&record, &parts).await;
        chunks.put("local_1", 1, b"bbbX".to_vec()).await.unwrap();

        let result = assembler.assemble("local_1").await;
        assert!(matches!(
            result,
            Err(AssemblyError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_chunk_fails_size_check() {
        let parts: [&[u8]; 2] = [b"aaaa", b"bbbb"];
        let record = chunked_record("local_1", &parts);
        let (assembler, chunks) = setup(&record, &parts).await;
        chunks.put("local_1", 1, b"bb".to_vec()).await.unwrap();

        let result = assembler.assemble("local_1").await;
        assert!(matches!(
            result,
            Err(AssemblyError::SizeMismatch {
                expected: 8,
                actual: 6,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_single_blob_without_digest() {
        let chunks = Arc::new(SqliteChunkStore::in_memory().unwrap());
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let mut record = chunked_record("local_9", &[b"blob".as_slice()]);
        record.use_chunks = false;
        record.files[0].chunk_info = None;
        record.files[0].sha256 = None;
        chunks.put("local_9", 0, b"blob".to_vec()).await.unwrap();
        catalog.put(&record).await.unwrap();

        let assembler = RetrievalAssembler::new(chunks, catalog);
        let image = assembler.assemble("local_9").await.unwrap();
        assert_eq!(image.data, b"blob");
    }
}
