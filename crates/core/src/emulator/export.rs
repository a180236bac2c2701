//! Emulator that exports images to a directory for an external frontend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{BootImage, BootReceipt, Emulator, EmulatorError};
use crate::archive::base_name;

/// Writes each booted image to `export_dir`, replacing any previous copy.
///
/// The file is written under a temporary name and renamed into place, so a
/// watcher on the directory never sees a partial image.
pub struct ExportEmulator {
    export_dir: PathBuf,
}

impl ExportEmulator {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn target_name(filename: &str) -> Result<String, EmulatorError> {
        let name = base_name(filename).trim();
        if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
            return Err(EmulatorError::InvalidName(filename.to_string()));
        }
        Ok(name.to_string())
    }
}

#[async_trait]
impl Emulator for ExportEmulator {
    fn name(&self) -> &str {
        "export"
    }

    async fn boot(&self, image: BootImage) -> Result<BootReceipt, EmulatorError> {
        let name = Self::target_name(&image.filename)?;
        let io_err = |path: &Path, source| EmulatorError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|e| io_err(&self.export_dir, e))?;

        let destination = self.export_dir.join(&name);
        let temp = self.export_dir.join(format!(".{}.partial", name));

        let mut file = File::create(&temp).await.map_err(|e| io_err(&temp, e))?;
        file.write_all(&image.data)
            .await
            .map_err(|e| io_err(&temp, e))?;
        file.sync_all().await.map_err(|e| io_err(&temp, e))?;
        drop(file);

        if let Err(e) = fs::rename(&temp, &destination).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_err(&destination, e));
        }

        info!(
            title_id = %image.title_id,
            path = %destination.display(),
            bytes = image.data.len(),
            "Exported disc image"
        );

        Ok(BootReceipt {
            location: Some(destination),
            bytes: image.data.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image(filename: &str, data: &[u8]) -> BootImage {
        BootImage {
            title_id: "local_1".to_string(),
            title_name: "Game".to_string(),
            filename: filename.to_string(),
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_boot_writes_image() {
        let temp = TempDir::new().unwrap();
        let emulator = ExportEmulator::new(temp.path().join("boot"));

        let receipt = emulator.boot(image("game.bin", b"disc")).await.unwrap();

        let path = temp.path().join("boot/game.bin");
        assert_eq!(receipt.location, Some(path.clone()));
        assert_eq!(receipt.bytes, 4);
        assert_eq!(std::fs::read(&path).unwrap(), b"disc");
        assert!(!temp.path().join("boot/.game.bin.partial").exists());
    }

    #[tokio::test]
    async fn test_boot_replaces_previous_export() {
        let temp = TempDir::new().unwrap();
        let emulator = ExportEmulator::new(temp.path());

        emulator.boot(image("game.bin", b"old")).await.unwrap();
        emulator.boot(image("game.bin", b"new!")).await.unwrap();

        assert_eq!(std::fs::read(temp.path().join("game.bin")).unwrap(), b"new!");
    }

    #[tokio::test]
    async fn test_boot_strips_directories_from_name() {
        let temp = TempDir::new().unwrap();
        let emulator = ExportEmulator::new(temp.path());

        emulator
            .boot(image("../../etc/game.iso", b"x"))
            .await
            .unwrap();

        assert!(temp.path().join("game.iso").exists());
    }

    #[tokio::test]
    async fn test_boot_rejects_empty_name() {
        let temp = TempDir::new().unwrap();
        let emulator = ExportEmulator::new(temp.path());

        let result = emulator.boot(image("dir/", b"x")).await;
        assert!(matches!(result, Err(EmulatorError::InvalidName(_))));
    }
}
