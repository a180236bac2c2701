//! Hand-off of reconstructed disc images to the emulation layer.

mod export;

pub use export::ExportEmulator;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A reconstructed disc image ready to boot.
#[derive(Debug, Clone)]
pub struct BootImage {
    pub title_id: String,
    pub title_name: String,
    /// Name the image is presented under (usually the main entry's name).
    pub filename: String,
    pub data: Vec<u8>,
}

/// What the emulation layer did with an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReceipt {
    /// Where the image was written, if it was written anywhere.
    pub location: Option<PathBuf>,
    pub bytes: u64,
}

/// Errors reported by an emulator.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Invalid image name: {0}")]
    InvalidName(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Emulator rejected image: {0}")]
    Rejected(String),
}

/// The emulation collaborator a title is booted through.
#[async_trait]
pub trait Emulator: Send + Sync {
    /// Returns the name of this emulator.
    fn name(&self) -> &str;

    /// Boot `image`.
    async fn boot(&self, image: BootImage) -> Result<BootReceipt, EmulatorError>;
}
