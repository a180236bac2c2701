use serde::Serialize;

use crate::catalog::TitleRecord;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: u64 = 1024 * 1024 * 1024;

/// Aggregate storage usage across the library.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub title_count: usize,
    pub total_bytes: u64,
    /// `total_bytes` in MiB, rounded to the nearest whole number.
    pub total_megabytes: u64,
    /// `total_bytes` in GiB, rounded to two decimals.
    pub total_gigabytes: f64,
    pub file_count: usize,
    pub chunked_count: usize,
}

impl LibraryStats {
    pub fn from_records(records: &[TitleRecord]) -> Self {
        let total_bytes: u64 = records.iter().map(|r| r.file_size).sum();
        Self {
            title_count: records.len(),
            total_bytes,
            total_megabytes: (total_bytes as f64 / MIB).round() as u64,
            total_gigabytes: (total_bytes as f64 / GIB as f64 * 100.0).round() / 100.0,
            file_count: records.iter().map(|r| r.files.len()).sum(),
            chunked_count: records.iter().filter(|r| r.use_chunks).count(),
        }
    }

    /// Size in the largest unit that keeps it readable.
    pub fn size_label(&self) -> String {
        if self.total_bytes >= GIB {
            format!("{:.2} GB", self.total_gigabytes)
        } else {
            format!("{} MB", self.total_megabytes)
        }
    }

    /// One-line description, e.g. `3 titles, 1.25 GB, 4 files`.
    pub fn summary(&self) -> String {
        format!(
            "{} titles, {}, {} files",
            self.title_count,
            self.size_label(),
            self.file_count
        )
    }
}
