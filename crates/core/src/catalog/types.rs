//! Types for the title catalog.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Bin,
    Iso,
    Img,
    Cue,
    Pbp,
    Ecm,
    Zip,
    #[default]
    Other,
}

impl FileType {
    /// Classify a file name by its (case-insensitive) extension.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        let ext = match lower.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => return FileType::Other,
        };
        match ext {
            "bin" => FileType::Bin,
            "iso" => FileType::Iso,
            "img" => FileType::Img,
            "cue" => FileType::Cue,
            "pbp" => FileType::Pbp,
            "ecm" => FileType::Ecm,
            "zip" => FileType::Zip,
            _ => FileType::Other,
        }
    }

    /// Whether entries of this type are kept when extracting an archive.
    pub fn is_disc_payload(&self) -> bool {
        matches!(
            self,
            FileType::Bin
                | FileType::Iso
                | FileType::Img
                | FileType::Cue
                | FileType::Ecm
                | FileType::Pbp
        )
    }

    /// Rank used to pick the main entry: bin, then iso, then pbp, then anything.
    pub fn main_entry_rank(&self) -> u8 {
        match self {
            FileType::Bin => 0,
            FileType::Iso => 1,
            FileType::Pbp => 2,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Bin => "bin",
            FileType::Iso => "iso",
            FileType::Img => "img",
            FileType::Cue => "cue",
            FileType::Pbp => "pbp",
            FileType::Ecm => "ecm",
            FileType::Zip => "zip",
            FileType::Other => "other",
        }
    }

    /// Parse the stored form. Unknown values map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "bin" => FileType::Bin,
            "iso" => FileType::Iso,
            "img" => FileType::Img,
            "cue" => FileType::Cue,
            "pbp" => FileType::Pbp,
            "ecm" => FileType::Ecm,
            "zip" => FileType::Zip,
            _ => FileType::Other,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte range covered by one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    pub index: u32,
    /// Offset of the first byte (inclusive).
    pub start: u64,
    /// Offset one past the last byte.
    pub end: u64,
    pub size: u64,
}

/// Chunk layout of a chunked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub title_id: String,
    pub total_chunks: u32,
    /// Slice size the file was written with.
    pub chunk_size: u64,
    #[serde(default)]
    pub chunks: Vec<ChunkBounds>,
}

/// A file belonging to an installed title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    /// Path inside the archive the entry was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_info: Option<ChunkInfo>,
    /// SHA-256 of the stored payload (lowercase hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileEntry {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        let filename = filename.into();
        let file_type = FileType::from_filename(&filename);
        Self {
            filename,
            full_path: None,
            size,
            file_type,
            chunk_info: None,
            sha256: None,
        }
    }
}

/// Catalog metadata describing one installed title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: String,
    pub name: String,
    pub region: String,
    pub original_filename: String,
    /// Size of the source as supplied at install time.
    pub file_size: u64,
    pub file_type: FileType,
    /// Ordered by main-entry priority; the first entry holds the stored payload.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    pub installed_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub is_compressed: bool,
    #[serde(default)]
    pub use_chunks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file_name: Option<String>,
}

impl TitleRecord {
    /// The entry whose bytes are held in the chunk store.
    pub fn stored_entry(&self) -> Option<&FileEntry> {
        if self.use_chunks {
            if let Some(entry) = self.files.iter().find(|f| f.chunk_info.is_some()) {
                return Some(entry);
            }
        }
        if let Some(main) = &self.main_file_name {
            if let Some(entry) = self.files.iter().find(|f| &f.filename == main) {
                return Some(entry);
            }
        }
        self.files.first()
    }

    /// Name handed to the emulator alongside the reconstructed image.
    pub fn display_filename(&self) -> &str {
        self.main_file_name
            .as_deref()
            .or_else(|| self.stored_entry().map(|f| f.filename.as_str()))
            .unwrap_or(&self.original_filename)
    }

    /// Number of stored chunks (1 for a single-blob title).
    pub fn total_chunks(&self) -> u32 {
        if self.use_chunks {
            self.stored_entry()
                .and_then(|f| f.chunk_info.as_ref())
                .map(|c| c.total_chunks)
                .unwrap_or(0)
        } else {
            1
        }
    }

    /// Record a play at `now`.
    pub fn mark_played(&mut self, now: DateTime<Utc>) {
        self.last_played = Some(now);
        self.play_count = self.play_count.saturating_add(1);
    }

    /// Most recent activity: last play, or install when never played.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_played.unwrap_or(self.installed_date)
    }
}

/// Generate a new title id.
///
/// UUID v7 carries a millisecond timestamp followed by counter and random
/// bits, so ids sort by install time and never collide within a process.
pub fn new_title_id() -> String {
    format!("local_{}", Uuid::now_v7().simple())
}

/// Display order: most recent activity first, then newest install.
pub fn display_order(a: &TitleRecord, b: &TitleRecord) -> Ordering {
    b.last_activity()
        .cmp(&a.last_activity())
        .then_with(|| b.installed_date.cmp(&a.installed_date))
        .then_with(|| a.id.cmp(&b.id))
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
