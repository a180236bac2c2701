use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{LibraryError, LibraryStats, RetrievalAssembler};
use crate::catalog::{display_order, CatalogError, CatalogStore, TitleRecord};
use crate::chunks::{ChunkError, ChunkStore};
use crate::config::InstallConfig;
use crate::emulator::{BootImage, BootReceipt, Emulator};
use crate::install::{InstallPipeline, InstallRequest};
use crate::metrics;
use crate::notify::{Notification, Notifier};

/// Result of a successful [`Library::play`].
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    /// The record after its play statistics were updated.
    pub record: TitleRecord,
    pub receipt: BootReceipt,
}

/// Entry point for everything the rest of the application does with the
/// local title library.
pub struct Library {
    pipeline: InstallPipeline,
    assembler: RetrievalAssembler,
    chunks: Arc<dyn ChunkStore>,
    catalog: Arc<dyn CatalogStore>,
    emulator: Arc<dyn Emulator>,
    notifier: Arc<dyn Notifier>,
}

impl Library {
    pub fn new(
        config: InstallConfig,
        chunks: Arc<dyn ChunkStore>,
        catalog: Arc<dyn CatalogStore>,
        emulator: Arc<dyn Emulator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline: InstallPipeline::new(
                config,
                Arc::clone(&chunks),
                Arc::clone(&catalog),
                Arc::clone(&notifier),
            ),
            assembler: RetrievalAssembler::new(Arc::clone(&chunks), Arc::clone(&catalog)),
            chunks,
            catalog,
            emulator,
            notifier,
        }
    }

    pub fn pipeline(&self) -> &InstallPipeline {
        &self.pipeline
    }

    pub fn emulator_name(&self) -> &str {
        self.emulator.name()
    }

    pub fn chunk_store_name(&self) -> &str {
        self.chunks.name()
    }

    /// Install a title from `request`.
    pub async fn install(&self, request: InstallRequest) -> Result<TitleRecord, LibraryError> {
        Ok(self.pipeline.install(request).await?)
    }

    /// All titles, most recently active first.
    pub async fn list(&self) -> Result<Vec<TitleRecord>, LibraryError> {
        let mut records = self.catalog.list().await?;
        records.sort_by(display_order);
        Ok(records)
    }

    pub async fn get(&self, id: &str) -> Result<TitleRecord, LibraryError> {
        self.catalog
            .get(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    /// Reassemble a title and boot it through the emulator.
    pub async fn play(&self, id: &str) -> Result<PlayOutcome, LibraryError> {
        let record = match self.get(id).await {
            Ok(record) => record,
            Err(e) => {
                self.notifier
                    .notify(Notification::error(format!("Failed to load title: {}", e)));
                return Err(e);
            }
        };

        let name = record.name.clone();
        match self.play_record(record).await {
            Ok(outcome) => {
                info!(
                    title_id = %outcome.record.id,
                    play_count = outcome.record.play_count,
                    emulator = %self.emulator.name(),
                    "Title booted"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(title_id = %id, error = %e, "Play failed");
                self.notifier
                    .notify(Notification::error(format!("Failed to load {}: {}", name, e)));
                Err(e)
            }
        }
    }

    async fn play_record(&self, mut record: TitleRecord) -> Result<PlayOutcome, LibraryError> {
        self.notifier
            .notify(Notification::loading(format!("Loading {}...", record.name)));
        if record.use_chunks {
            self.notifier.notify(Notification::loading(format!(
                "Assembling {} from {} parts...",
                record.name,
                record.total_chunks()
            )));
        }

        let image = self.assembler.assemble_record(&record).await?;

        record.mark_played(Utc::now());
        self.catalog.put(&record).await?;

        let receipt = self
            .emulator
            .boot(BootImage {
                title_id: record.id.clone(),
                title_name: record.name.clone(),
                filename: image.filename,
                data: image.data,
            })
            .await?;

        Ok(PlayOutcome { record, receipt })
    }

    /// Remove a title. Returns `false` when no such title exists.
    ///
    /// Chunks stored under `id` are deleted either way, so a payload left by
    /// an interrupted install can still be reclaimed by id.
    pub async fn remove(&self, id: &str) -> Result<bool, LibraryError> {
        let record = self.catalog.get(id).await?;
        let deleted = match self.chunks.delete_all(id).await {
            Ok(deleted) => deleted,
            // No chunk can be stored under an id the store would not accept.
            Err(ChunkError::InvalidKey(_)) if record.is_none() => 0,
            Err(e) => return Err(e.into()),
        };

        let Some(record) = record else {
            if deleted > 0 {
                info!(title_id = %id, chunks = deleted, "Removed orphaned chunks");
            } else {
                debug!(title_id = %id, "Remove requested for unknown title");
            }
            return Ok(false);
        };

        match self.catalog.delete(id).await {
            Ok(()) | Err(CatalogError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        metrics::TITLES_REMOVED.inc();
        info!(title_id = %id, chunks = deleted, "Title removed");
        self.notifier
            .notify(Notification::success(format!("\"{}\" removed", record.name)));
        Ok(true)
    }

    /// Delete every chunk set that no catalog record points at, returning
    /// the ids swept.
    ///
    /// Such sets are left when the process stops mid-install. Installs in
    /// flight have no record yet either, so only call this before serving.
    pub async fn sweep_orphans(&self) -> Result<Vec<String>, LibraryError> {
        let known: HashSet<String> = self
            .catalog
            .list()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();

        let mut swept = Vec::new();
        for id in self.chunks.title_ids().await? {
            if known.contains(&id) {
                continue;
            }
            let removed = self.chunks.delete_all(&id).await?;
            warn!(title_id = %id, chunks = removed, "Removed orphaned chunks");
            swept.push(id);
        }
        Ok(swept)
    }

    /// Remove every title and chunk.
    pub async fn clear(&self) -> Result<(), LibraryError> {
        self.chunks.clear().await?;
        self.catalog.clear().await?;
        info!("Library cleared");
        self.notifier.notify(Notification::info("All titles removed"));
        Ok(())
    }

    pub async fn stats(&self) -> Result<LibraryStats, LibraryError> {
        let records = self.catalog.list().await?;
        Ok(LibraryStats::from_records(&records))
    }

    /// Like [`stats`](Self::stats), also announcing the summary.
    pub async fn storage_summary(&self) -> Result<LibraryStats, LibraryError> {
        let stats = self.stats().await?;
        self.notifier
            .notify(Notification::info(format!("Cache: {}", stats.summary())));
        Ok(stats)
    }

    /// Flush both stores to durable storage.
    pub async fn shutdown(&self) -> Result<(), LibraryError> {
        self.chunks.flush().await?;
        self.catalog.flush().await?;
        info!("Library flushed");
        Ok(())
    }
}
