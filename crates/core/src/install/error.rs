use thiserror::Error;

use crate::archive::ArchiveError;
use crate::catalog::CatalogError;
use crate::chunks::ChunkError;

/// Errors that abort an install.
///
/// Every variant leaves the library as it was: no catalog record and no
/// chunks for the aborted title.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to read {filename}: {source}")]
    SourceRead {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No playable disc image found in {filename}")]
    NoPlayableEntry { filename: String },

    #[error("Failed to extract {filename}: {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ArchiveError,
    },

    #[error("Failed to store part {index} of {title_id}: {source}")]
    ChunkPersist {
        title_id: String,
        index: u32,
        #[source]
        source: ChunkError,
    },

    #[error("Failed to spool archive to disk: {0}")]
    Spool(#[source] std::io::Error),

    #[error("Failed to save {title_id} to the catalog: {source}")]
    CatalogPersist {
        title_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("Install cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InstallError {
    pub(crate) fn source_read(filename: &str, source: std::io::Error) -> Self {
        Self::SourceRead {
            filename: filename.to_string(),
            source,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InstallError::SourceRead { .. } => "source_read",
            InstallError::NoPlayableEntry { .. } => "no_playable_entry",
            InstallError::Extraction { .. } => "extraction",
            InstallError::ChunkPersist { .. } => "chunk_persist",
            InstallError::Spool(_) => "spool",
            InstallError::CatalogPersist { .. } => "catalog_persist",
            InstallError::Cancelled => "cancelled",
            InstallError::Internal(_) => "internal",
        }
    }

    /// Whether the same install might succeed if tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InstallError::SourceRead { .. }
                | InstallError::ChunkPersist { .. }
                | InstallError::CatalogPersist { .. }
        )
    }
}
