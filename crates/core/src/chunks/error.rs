use std::path::PathBuf;
use thiserror::Error;

/// Errors from chunk storage.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The title id cannot be used as a storage key.
    #[error("Invalid title id: {0}")]
    InvalidKey(String),

    /// Injected or backend-reported write refusal (e.g. quota exceeded).
    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChunkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
