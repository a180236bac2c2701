//! Install pipeline: classify, extract, chunk, persist, commit.
//!
//! A title becomes visible in the catalog only after every byte of its
//! payload is durably stored. Any failure before that point removes the
//! chunks already written and leaves the catalog untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::progress::ProgressReporter;
use super::types::{CancelHandle, InstallKind, InstallRequest, InstallSource, InstallStage};
use super::InstallError;
use crate::archive::{ArchiveError, ArchiveExtractor, Listing};
use crate::catalog::{
    new_title_id, CatalogStore, ChunkBounds, ChunkInfo, FileEntry, FileType, TitleRecord,
};
use crate::chunks::ChunkStore;
use crate::config::InstallConfig;
use crate::metrics;
use crate::notify::{format_megabytes, Notification, Notifier};

/// Identity of the install in flight.
struct Job<'a> {
    title_id: &'a str,
    name: &'a str,
    cancel: &'a CancelHandle,
}

impl Job<'_> {
    fn check_cancelled(&self) -> Result<(), InstallError> {
        if self.cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        Ok(())
    }
}

/// Payload written to the chunk store, before it is committed to the catalog.
struct StoredPayload {
    /// Main entry first.
    files: Vec<FileEntry>,
    main_file_name: String,
    use_chunks: bool,
}

/// Writes consecutive slices of one payload as chunks `0..n`, hashing as it goes.
struct ChunkWriter<'a> {
    pipeline: &'a InstallPipeline,
    title_id: &'a str,
    hasher: Sha256,
    bounds: Vec<ChunkBounds>,
    offset: u64,
}

impl<'a> ChunkWriter<'a> {
    fn new(pipeline: &'a InstallPipeline, title_id: &'a str) -> Self {
        Self {
            pipeline,
            title_id,
            hasher: Sha256::new(),
            bounds: Vec::new(),
            offset: 0,
        }
    }

    async fn push(&mut self, slice: Vec<u8>) -> Result<(), InstallError> {
        let index = self.bounds.len() as u32;
        let len = slice.len() as u64;

        let hasher = std::mem::take(&mut self.hasher);
        let (hasher, slice) = digest_slice(hasher, slice).await?;
        self.hasher = hasher;

        self.pipeline.write_chunk(self.title_id, index, slice).await?;

        self.bounds.push(ChunkBounds {
            index,
            start: self.offset,
            end: self.offset + len,
            size: len,
        });
        self.offset += len;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.offset
    }

    /// Chunk layout and hex digest of everything pushed.
    fn finish(self, chunk_size: u64) -> (ChunkInfo, String) {
        let info = ChunkInfo {
            title_id: self.title_id.to_string(),
            total_chunks: self.bounds.len() as u32,
            chunk_size,
            chunks: self.bounds,
        };
        (info, format!("{:x}", self.hasher.finalize()))
    }
}

async fn digest_slice(
    mut hasher: Sha256,
    slice: Vec<u8>,
) -> Result<(Sha256, Vec<u8>), InstallError> {
    tokio::task::spawn_blocking(move || {
        hasher.update(&slice);
        (hasher, slice)
    })
    .await
    .map_err(|e| InstallError::Internal(e.to_string()))
}

/// Installs titles into the chunk store and catalog.
pub struct InstallPipeline {
    config: InstallConfig,
    chunks: Arc<dyn ChunkStore>,
    catalog: Arc<dyn CatalogStore>,
    extractor: ArchiveExtractor,
    notifier: Arc<dyn Notifier>,
}

impl InstallPipeline {
    pub fn new(
        config: InstallConfig,
        chunks: Arc<dyn ChunkStore>,
        catalog: Arc<dyn CatalogStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            chunks,
            catalog,
            extractor: ArchiveExtractor::new(),
            notifier,
        }
    }

    /// Replaces the archive extractor.
    pub fn with_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    fn chunk_size(&self) -> u64 {
        self.config.chunk_size.max(1) as u64
    }

    /// Decide how `source` will be installed.
    pub fn classify(&self, source: &InstallSource) -> InstallKind {
        if source.size() <= self.config.small_file_threshold {
            InstallKind::Single
        } else if self.extractor.is_archive(source.filename()) {
            InstallKind::Archive
        } else {
            InstallKind::Chunked
        }
    }

    /// Install a title. On success the returned record is already in the catalog.
    pub async fn install(&self, request: InstallRequest) -> Result<TitleRecord, InstallError> {
        let InstallRequest {
            mut source,
            name,
            region,
            progress,
            cancel,
        } = request;

        let title_id = new_title_id();
        let cancel = cancel.unwrap_or_default();
        let kind = self.classify(&source);
        let mut reporter = ProgressReporter::new(&title_id, progress);
        let started = Instant::now();

        let job = Job {
            title_id: &title_id,
            name: &name,
            cancel: &cancel,
        };

        info!(
            title_id = %title_id,
            name = %name,
            filename = %source.filename(),
            size = source.size(),
            kind = kind.as_str(),
            "Starting install"
        );
        self.notifier.notify(Notification::loading(format!(
            "Installing \"{}\" ({})...",
            name,
            format_megabytes(source.size())
        )));

        let result = async {
            let payload = match kind {
                InstallKind::Single => {
                    self.install_single(&job, &mut source, &mut reporter).await?
                }
                InstallKind::Chunked => {
                    self.install_chunked(&job, &mut source, &mut reporter).await?
                }
                InstallKind::Archive => {
                    self.install_archive(&job, &mut source, &mut reporter).await?
                }
            };

            job.check_cancelled()?;

            let record = TitleRecord {
                id: title_id.clone(),
                name: name.clone(),
                region,
                original_filename: source.filename().to_string(),
                file_size: source.size(),
                file_type: FileType::from_filename(source.filename()),
                files: payload.files,
                installed_date: Utc::now(),
                last_played: None,
                play_count: 0,
                is_compressed: self.extractor.is_archive(source.filename()),
                use_chunks: payload.use_chunks,
                main_file_name: Some(payload.main_file_name),
            };

            reporter.report(reporter.last(), InstallStage::Committing);
            self.catalog
                .put(&record)
                .await
                .map_err(|e| InstallError::CatalogPersist {
                    title_id: title_id.clone(),
                    source: e,
                })?;

            reporter.report(1.0, InstallStage::Completed);
            Ok::<_, InstallError>(record)
        }
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::INSTALL_DURATION
            .with_label_values(&[kind.as_str()])
            .observe(elapsed);

        match result {
            Ok(record) => {
                metrics::INSTALLS_TOTAL
                    .with_label_values(&[kind.as_str(), "success"])
                    .inc();
                info!(
                    title_id = %record.id,
                    chunks = record.total_chunks(),
                    elapsed_secs = elapsed,
                    "Install complete"
                );
                self.notifier.notify(Notification::success(format!(
                    "\"{}\" installed successfully!",
                    name
                )));
                Ok(record)
            }
            Err(e) => {
                metrics::INSTALLS_TOTAL
                    .with_label_values(&[kind.as_str(), e.kind()])
                    .inc();
                warn!(title_id = %title_id, error = %e, "Install failed");
                self.cleanup(&title_id).await;
                self.notifier
                    .notify(Notification::error(format!("Install failed: {}", e)));
                Err(e)
            }
        }
    }

    /// Remove whatever chunks an aborted install left behind.
    async fn cleanup(&self, title_id: &str) {
        match self.chunks.delete_all(title_id).await {
            Ok(0) => {}
            Ok(removed) => debug!(title_id, removed, "Removed partial chunks"),
            Err(e) => error!(title_id, error = %e, "Failed to remove partial chunks"),
        }
    }

    async fn write_chunk(
        &self,
        title_id: &str,
        index: u32,
        data: Vec<u8>,
    ) -> Result<(), InstallError> {
        let len = data.len() as u64;
        match self.chunks.put(title_id, index, data).await {
            Ok(()) => {
                metrics::CHUNKS_WRITTEN.inc();
                metrics::BYTES_WRITTEN.inc_by(len);
                debug!(title_id, index, bytes = len, "Chunk committed");
                Ok(())
            }
            Err(e) => {
                metrics::CHUNK_WRITE_FAILURES.inc();
                Err(InstallError::ChunkPersist {
                    title_id: title_id.to_string(),
                    index,
                    source: e,
                })
            }
        }
    }

    /// Read exactly `len` bytes from the source.
    async fn read_slice(
        source: &mut InstallSource,
        len: usize,
    ) -> Result<Vec<u8>, InstallError> {
        let mut buf = vec![0u8; len];
        let read = source.reader().read_exact(&mut buf).await;
        read.map_err(|e| InstallError::source_read(source.filename(), e))?;
        Ok(buf)
    }

    /// Path (a): hold the source in memory and store the main entry as one blob.
    async fn install_single(
        &self,
        job: &Job<'_>,
        source: &mut InstallSource,
        reporter: &mut ProgressReporter,
    ) -> Result<StoredPayload, InstallError> {
        let size = source.size();
        let step = self.chunk_size();

        reporter.report(0.0, InstallStage::Reading);
        let mut data = Vec::with_capacity(size as usize);
        while (data.len() as u64) < size {
            job.check_cancelled()?;
            let want = (size - data.len() as u64).min(step) as usize;
            let slice = Self::read_slice(source, want).await?;
            data.extend_from_slice(&slice);
            reporter.report_span(0.0, 0.3, data.len() as u64, size, InstallStage::Reading);
        }
        reporter.report(0.3, InstallStage::Reading);

        let is_archive = self.extractor.is_archive(source.filename());
        if is_archive {
            reporter.report(0.4, InstallStage::Extracting);
        }

        let extractor = self.extractor.clone();
        let filename = source.filename().to_string();
        let (extraction, digest) = tokio::task::spawn_blocking(move || {
            let extraction = extractor.extract(&filename, data);
            let digest = extraction
                .entries
                .first()
                .map(|main| format!("{:x}", Sha256::digest(&main.data)));
            (extraction, digest)
        })
        .await
        .map_err(|e| InstallError::Internal(e.to_string()))?;

        if is_archive {
            reporter.report(0.5, InstallStage::Extracting);
        }

        let mut entries = extraction.entries;
        if entries.is_empty() {
            return Err(InstallError::NoPlayableEntry {
                filename: source.filename().to_string(),
            });
        }

        let mut files: Vec<FileEntry> = entries
            .iter()
            .map(|entry| FileEntry {
                filename: entry.filename.clone(),
                full_path: entry.full_path.clone(),
                size: entry.size(),
                file_type: entry.file_type,
                chunk_info: None,
                sha256: None,
            })
            .collect();
        files[0].sha256 = digest;
        let main_file_name = entries[0].filename.clone();
        let main_data = std::mem::take(&mut entries[0].data);
        drop(entries);

        debug!(
            title_id = job.title_id,
            main = %main_file_name,
            entries = files.len(),
            "Selected main entry"
        );
        reporter.report(0.7, InstallStage::Extracting);

        job.check_cancelled()?;
        reporter.report(0.9, InstallStage::Writing);
        self.write_chunk(job.title_id, 0, main_data).await?;

        Ok(StoredPayload {
            files,
            main_file_name,
            use_chunks: false,
        })
    }

    /// Path (b): stream the source straight into chunks, one slice resident at a time.
    async fn install_chunked(
        &self,
        job: &Job<'_>,
        source: &mut InstallSource,
        reporter: &mut ProgressReporter,
    ) -> Result<StoredPayload, InstallError> {
        let size = source.size();
        let chunk_size = self.chunk_size();
        let total_chunks = size.div_ceil(chunk_size);

        self.notifier.notify(Notification::loading(format!(
            "Installing \"{}\" in {} parts...",
            job.name, total_chunks
        )));
        reporter.report(0.0, InstallStage::Writing);

        let mut writer = ChunkWriter::new(self, job.title_id);
        for index in 0..total_chunks {
            job.check_cancelled()?;
            let start = index * chunk_size;
            let len = (size - start).min(chunk_size) as usize;
            let slice = Self::read_slice(source, len).await?;
            writer.push(slice).await?;
            reporter.report_span(0.0, 1.0, index + 1, total_chunks, InstallStage::Writing);
        }

        let (chunk_info, digest) = writer.finish(chunk_size);
        let filename = source.filename().to_string();
        let mut entry = FileEntry::new(filename.clone(), size);
        entry.chunk_info = Some(chunk_info);
        entry.sha256 = Some(digest);

        Ok(StoredPayload {
            files: vec![entry],
            main_file_name: filename,
            use_chunks: true,
        })
    }

    /// Path (c): spool the archive to disk, then stream its main entry into chunks.
    async fn install_archive(
        &self,
        job: &Job<'_>,
        source: &mut InstallSource,
        reporter: &mut ProgressReporter,
    ) -> Result<StoredPayload, InstallError> {
        let filename = source.filename().to_string();
        let chunk_size = self.chunk_size();

        let spool = self.spool(job, source, reporter).await?;
        let spool_path: PathBuf = spool.path().to_path_buf();

        reporter.report(0.4, InstallStage::Extracting);
        let listing = {
            let extractor = self.extractor.clone();
            let filename = filename.clone();
            let path = spool_path.clone();
            tokio::task::spawn_blocking(move || extractor.list_file(&filename, &path))
                .await
                .map_err(|e| InstallError::Internal(e.to_string()))?
        };
        reporter.report(0.5, InstallStage::Extracting);

        let (mut files, expected, main_index) = match listing {
            Listing::Empty => {
                return Err(InstallError::NoPlayableEntry { filename });
            }
            Listing::Playable(entries) => {
                let main = &entries[0];
                let expected = main.size;
                let index = main.index;
                let files = entries
                    .iter()
                    .map(|entry| FileEntry {
                        filename: entry.filename.clone(),
                        full_path: Some(entry.full_path.clone()),
                        size: entry.size,
                        file_type: entry.file_type,
                        chunk_info: None,
                        sha256: None,
                    })
                    .collect::<Vec<_>>();
                (files, expected, Some(index))
            }
            Listing::Opaque => {
                let mut entry = FileEntry::new(filename.clone(), source.size());
                entry.file_type = FileType::Other;
                (vec![entry], source.size(), None)
            }
        };

        let total_chunks = expected.div_ceil(chunk_size);
        self.notifier.notify(Notification::loading(format!(
            "Installing \"{}\" in {} parts...",
            job.name, total_chunks
        )));
        debug!(
            title_id = job.title_id,
            main = %files[0].filename,
            bytes = expected,
            total_chunks,
            "Streaming main entry"
        );

        let streamed = match self
            .stream_spool(job, reporter, &filename, &spool_path, main_index, expected)
            .await?
        {
            Ok(streamed) => streamed,
            Err(e) => {
                // Same fallback as an undecodable small archive: keep the source whole.
                warn!(
                    title_id = job.title_id,
                    filename = %filename,
                    error = %e,
                    "Archive entry could not be decoded, storing as-is"
                );
                self.cleanup(job.title_id).await;
                let mut entry = FileEntry::new(filename.clone(), source.size());
                entry.file_type = FileType::Other;
                files = vec![entry];
                self.stream_spool(job, reporter, &filename, &spool_path, None, source.size())
                    .await?
                    .map_err(|e| InstallError::Extraction {
                        filename: filename.clone(),
                        source: e,
                    })?
            }
        };
        drop(spool);

        let (chunk_info, digest, produced) = streamed;
        files[0].size = produced;
        files[0].chunk_info = Some(chunk_info);
        files[0].sha256 = Some(digest);
        let main_file_name = files[0].filename.clone();

        Ok(StoredPayload {
            files,
            main_file_name,
            use_chunks: true,
        })
    }

    /// Stream entry `main_index` of the spooled archive (or the whole spool when
    /// `None`) into chunks `0..n`.
    ///
    /// The outer error aborts the install. The inner one means the entry's
    /// data could not be decoded; chunks written before it was noticed are
    /// left for the caller to remove.
    async fn stream_spool(
        &self,
        job: &Job<'_>,
        reporter: &mut ProgressReporter,
        filename: &str,
        path: &Path,
        main_index: Option<usize>,
        expected: u64,
    ) -> Result<Result<(ChunkInfo, String, u64), ArchiveError>, InstallError> {
        let chunk_size = self.chunk_size();

        // Decoding runs on the blocking pool and hands slices over one at a time.
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1);
        let producer = {
            let extractor = self.extractor.clone();
            let filename = filename.to_string();
            let path = path.to_path_buf();
            let slice_size = chunk_size as usize;
            tokio::task::spawn_blocking(move || {
                let mut sink = |slice: Vec<u8>| {
                    tx.blocking_send(slice).map_err(|_| ArchiveError::Aborted)
                };
                match main_index {
                    Some(index) => {
                        extractor.read_file_entry(&filename, &path, index, slice_size, &mut sink)
                    }
                    None => ArchiveExtractor::read_file_raw(&path, slice_size, &mut sink),
                }
            })
        };

        let mut writer = ChunkWriter::new(self, job.title_id);
        let consumed: Result<(), InstallError> = async {
            while let Some(slice) = rx.recv().await {
                job.check_cancelled()?;
                writer.push(slice).await?;
                reporter.report_span(0.5, 0.95, writer.written(), expected, InstallStage::Writing);
            }
            Ok(())
        }
        .await;
        drop(rx);

        let produced = producer
            .await
            .map_err(|e| InstallError::Internal(e.to_string()))?;
        consumed?;

        match produced {
            Ok(bytes) => {
                let (chunk_info, digest) = writer.finish(chunk_size);
                Ok(Ok((chunk_info, digest, bytes)))
            }
            Err(e @ (ArchiveError::Decode(_) | ArchiveError::Truncated { .. }))
                if main_index.is_some() =>
            {
                Ok(Err(e))
            }
            Err(source) => Err(InstallError::Extraction {
                filename: filename.to_string(),
                source,
            }),
        }
    }

    /// Copy the source into a temporary file, reporting read progress in `[0, 0.4]`.
    async fn spool(
        &self,
        job: &Job<'_>,
        source: &mut InstallSource,
        reporter: &mut ProgressReporter,
    ) -> Result<tempfile::NamedTempFile, InstallError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("discvault-").suffix(".spool");
        let spool = match &self.config.spool_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(InstallError::Spool)?;

        let file = spool.reopen().map_err(InstallError::Spool)?;
        let mut out = tokio::fs::File::from_std(file);

        let size = source.size();
        let step = self.chunk_size();
        let mut copied = 0u64;
        reporter.report(0.0, InstallStage::Reading);
        while copied < size {
            job.check_cancelled()?;
            let want = (size - copied).min(step) as usize;
            let slice = Self::read_slice(source, want).await?;
            out.write_all(&slice).await.map_err(InstallError::Spool)?;
            copied += want as u64;
            reporter.report_span(0.0, 0.4, copied, size, InstallStage::Reading);
        }
        out.flush().await.map_err(InstallError::Spool)?;

        debug!(
            title_id = job.title_id,
            path = %spool.path().display(),
            bytes = copied,
            "Spooled archive"
        );
        Ok(spool)
    }
}
