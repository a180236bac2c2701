//! Testing utilities and mock implementations.
//!
//! This module provides in-memory stand-ins for the library's collaborators
//! so install and play flows can be exercised without a database or an
//! emulator.
//!
//! # Example
//!
//! ```rust,ignore
//! use discvault_core::testing::{MemoryChunkStore, MockEmulator, MockNotifier};
//!
//! let chunks = MemoryChunkStore::new();
//! chunks.fail_at(12).await;
//!
//! // Build a Library with the mocks, then assert on what they saw.
//! let booted = emulator.booted().await;
//! ```

mod memory_catalog_store;
mod memory_chunk_store;
mod mock_emulator;
mod mock_notifier;
mod pattern_reader;

pub use memory_catalog_store::MemoryCatalogStore;
pub use memory_chunk_store::{MemoryChunkStore, RecordedWrite};
pub use mock_emulator::MockEmulator;
pub use mock_notifier::MockNotifier;
pub use pattern_reader::PatternReader;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use chrono::Utc;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use crate::catalog::{FileEntry, FileType, TitleRecord};

    /// Byte at `offset` of the deterministic test pattern.
    pub fn pattern_byte(offset: u64) -> u8 {
        (offset % 251) as u8
    }

    /// The first `len` bytes of the deterministic test pattern.
    pub fn pattern_bytes(len: usize) -> Vec<u8> {
        (0..len as u64).map(pattern_byte).collect()
    }

    /// Build a stored (uncompressed) zip archive in memory.
    ///
    /// Names ending in `/` become directory entries.
    pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, data) in files {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }

        writer.finish().unwrap().into_inner()
    }

    /// Like [`zip_bytes`], with one byte of `target`'s stored payload flipped.
    ///
    /// The directory stays intact, so only the entry's CRC check can notice.
    /// The payload of `target` must appear exactly once in the archive.
    pub fn zip_bytes_with_corrupt_entry(files: &[(&str, &[u8])], target: &str) -> Vec<u8> {
        let payload = files
            .iter()
            .find(|(name, _)| *name == target)
            .map(|(_, data)| *data)
            .expect("target must be one of the files");
        assert!(!payload.is_empty(), "target payload must not be empty");

        let mut zip = zip_bytes(files);
        let start = zip
            .windows(payload.len())
            .position(|window| window == payload)
            .expect("stored payload not found in archive");
        zip[start + payload.len() / 2] ^= 0xFF;
        zip
    }

    /// Create a single-blob title record with reasonable defaults.
    pub fn title_record(id: &str, name: &str, size: u64) -> TitleRecord {
        let filename = format!("{}.bin", name);
        TitleRecord {
            id: id.to_string(),
            name: name.to_string(),
            region: "NTSC-U".to_string(),
            original_filename: filename.clone(),
            file_size: size,
            file_type: FileType::Bin,
            files: vec![FileEntry::new(filename.clone(), size)],
            installed_date: Utc::now(),
            last_played: None,
            play_count: 0,
            is_compressed: false,
            use_chunks: false,
            main_file_name: Some(filename),
        }
    }
}
