use thiserror::Error;

use crate::catalog::CatalogError;
use crate::chunks::ChunkError;
use crate::emulator::EmulatorError;
use crate::install::InstallError;

/// Errors from reconstructing a stored image.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Title not found: {0}")]
    NotFound(String),

    #[error("Title {0} has no stored payload")]
    NoPayload(String),

    #[error("Title {title_id} is missing part {index}")]
    MissingChunk { title_id: String, index: u32 },

    #[error("Title {title_id} assembled to {actual} bytes, expected {expected}")]
    SizeMismatch {
        title_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Title {title_id} failed checksum verification")]
    ChecksumMismatch {
        title_id: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Chunks(#[from] ChunkError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssemblyError {
    /// Whether the stored data itself is damaged (as opposed to unreadable).
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            AssemblyError::NoPayload(_)
                | AssemblyError::MissingChunk { .. }
                | AssemblyError::SizeMismatch { .. }
                | AssemblyError::ChecksumMismatch { .. }
        )
    }
}

/// Errors surfaced by [`Library`](super::Library).
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Title not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Assembly(AssemblyError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Chunks(#[from] ChunkError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),
}

impl From<AssemblyError> for LibraryError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::NotFound(id) => LibraryError::NotFound(id),
            other => LibraryError::Assembly(other),
        }
    }
}

impl LibraryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LibraryError::NotFound(_))
    }

    /// Whether a stored title failed integrity checks.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, LibraryError::Assembly(e) if e.is_corrupt())
    }
}
