use thiserror::Error;

use crate::catalog::FileType;

/// A file entry inside an archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the archive directory.
    pub index: usize,
    /// Path as stored in the archive.
    pub full_path: String,
    /// Final path component of `full_path`.
    pub filename: String,
    /// Uncompressed size.
    pub size: u64,
    pub file_type: FileType,
}

impl ArchiveEntry {
    pub fn new(index: usize, full_path: impl Into<String>, size: u64) -> Self {
        let full_path = full_path.into();
        let filename = base_name(&full_path).to_string();
        let file_type = FileType::from_filename(&filename);
        Self {
            index,
            full_path,
            filename,
            size,
            file_type,
        }
    }
}

/// A decoded file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub filename: String,
    /// Path inside the archive, `None` for a source that was not unpacked.
    pub full_path: Option<String>,
    pub file_type: FileType,
    pub data: Vec<u8>,
}

impl ExtractedEntry {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Result of extracting an in-memory source.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Entries ordered by main-entry priority. Empty when an archive decoded
    /// but held nothing from the allow-list.
    pub entries: Vec<ExtractedEntry>,
    /// Whether the source was unpacked as an archive.
    pub decoded: bool,
}

/// Directory listing of an archive spooled to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Allow-listed entries ordered by main-entry priority.
    Playable(Vec<ArchiveEntry>),
    /// The archive decoded but held nothing from the allow-list.
    Empty,
    /// Not an archive, or its directory could not be decoded. The source
    /// should be stored as-is.
    Opaque,
}

/// Errors from archive decoding.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to decode archive: {0}")]
    Decode(String),

    #[error("Entry {0} not found in archive")]
    EntryNotFound(usize),

    #[error("Entry {index} ended after {actual} of {expected} bytes")]
    Truncated {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The consumer stopped accepting slices.
    #[error("Extraction aborted")]
    Aborted,
}

/// Final component of an archive path, accepting either separator.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Stable-sort items so the main entry comes first: the first `bin`, else the
/// first `iso`, else the first `pbp`, else whatever came first.
pub fn order_by_priority<T>(items: &mut [T], file_type: impl Fn(&T) -> FileType) {
    items.sort_by_key(|item| file_type(item).main_entry_rank());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("game.bin"), "game.bin");
        assert_eq!(base_name("Game (USA)/Game (USA).cue"), "Game (USA).cue");
        assert_eq!(base_name("dir\\sub\\track.bin"), "track.bin");
    }

    #[test]
    fn test_entry_classifies_by_base_name() {
        let entry = ArchiveEntry::new(2, "folder.iso/readme.txt", 10);
        assert_eq!(entry.filename, "readme.txt");
        assert_eq!(entry.file_type, FileType::Other);
    }

    #[test]
    fn test_order_prefers_bin_then_iso_then_pbp() {
        let mut types = vec![FileType::Cue, FileType::Iso, FileType::Bin, FileType::Bin];
        order_by_priority(&mut types, |t| *t);
        assert_eq!(types[0], FileType::Bin);

        let mut types = vec![FileType::Pbp, FileType::Cue, FileType::Iso];
        order_by_priority(&mut types, |t| *t);
        assert_eq!(types[0], FileType::Iso);

        let mut types = vec![FileType::Cue, FileType::Pbp];
        order_by_priority(&mut types, |t| *t);
        assert_eq!(types[0], FileType::Pbp);
    }

    #[test]
    fn test_order_falls_back_to_first_and_is_stable() {
        let mut entries = vec![
            ArchiveEntry::new(0, "a.cue", 1),
            ArchiveEntry::new(1, "b.img", 1),
            ArchiveEntry::new(2, "c.ecm", 1),
        ];
        order_by_priority(&mut entries, |e| e.file_type);
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.cue", "b.img", "c.ecm"]);
    }

    #[test]
    fn test_first_bin_wins_among_several() {
        let mut entries = vec![
            ArchiveEntry::new(0, "Track 02.bin", 1),
            ArchiveEntry::new(1, "Game.cue", 1),
            ArchiveEntry::new(2, "Track 01.bin", 1),
        ];
        order_by_priority(&mut entries, |e| e.file_type);
        assert_eq!(entries[0].filename, "Track 02.bin");
        assert_eq!(entries[1].filename, "Track 01.bin");
        assert_eq!(entries[2].filename, "Game.cue");
    }
}
