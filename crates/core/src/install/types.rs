//! Types for the install pipeline.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use super::InstallError;

/// A readable source of known total size.
pub struct InstallSource {
    filename: String,
    size: u64,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl InstallSource {
    /// Wraps a reader that yields exactly `size` bytes.
    pub fn new(
        filename: impl Into<String>,
        size: u64,
        reader: impl AsyncRead + Send + 'static,
    ) -> Self {
        Self {
            filename: filename.into(),
            size,
            reader: Box::pin(reader),
        }
    }

    /// Source backed by an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(filename, size, Cursor::new(data))
    }

    /// Source backed by a file on disk. The filename is the path's last component.
    pub async fn from_path(path: &Path) -> Result<Self, InstallError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| InstallError::source_read(&filename, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| InstallError::source_read(&filename, e))?
            .len();

        Ok(Self::new(filename, size, file))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn reader(&mut self) -> &mut Pin<Box<dyn AsyncRead + Send>> {
        &mut self.reader
    }
}

impl fmt::Debug for InstallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallSource")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Everything needed to install one title.
#[derive(Debug)]
pub struct InstallRequest {
    pub source: InstallSource,
    pub name: String,
    pub region: String,
    pub progress: Option<mpsc::Sender<InstallProgress>>,
    pub cancel: Option<CancelHandle>,
}

impl InstallRequest {
    pub fn new(source: InstallSource, name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            region: region.into(),
            progress: None,
            cancel: None,
        }
    }

    /// Sets the progress sink.
    pub fn with_progress(mut self, tx: mpsc::Sender<InstallProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Sets the cancellation handle.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// How a source is installed, decided by size and file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallKind {
    /// Held in memory and stored as one blob.
    Single,
    /// Streamed into fixed-size chunks.
    Chunked,
    /// Spooled to disk, main entry streamed into chunks.
    Archive,
}

impl InstallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallKind::Single => "single",
            InstallKind::Chunked => "chunked",
            InstallKind::Archive => "archive",
        }
    }
}

/// Stage an install is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    Reading,
    Extracting,
    Writing,
    Committing,
    Completed,
}

/// Progress update for one install.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallProgress {
    pub title_id: String,
    /// Fraction complete, in `[0, 1]` and never decreasing.
    pub fraction: f32,
    pub stage: InstallStage,
}

/// Cooperative cancellation for an install. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_from_bytes() {
        let mut source = InstallSource::from_bytes("game.bin", vec![1, 2, 3]);
        assert_eq!(source.filename(), "game.bin");
        assert_eq!(source.size(), 3);

        let mut buf = Vec::new();
        source.reader().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[9u8; 42]).unwrap();

        let source = InstallSource::from_path(file.path()).await.unwrap();
        assert_eq!(source.size(), 42);
        assert_eq!(
            source.filename(),
            file.path().file_name().unwrap().to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_from_missing_path() {
        let result = InstallSource::from_path(Path::new("/nonexistent/game.bin")).await;
        assert!(matches!(result, Err(InstallError::SourceRead { .. })));
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }
}
