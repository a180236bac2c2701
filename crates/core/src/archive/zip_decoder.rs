//! Zip archive decoder.

use std::io::Read;

use zip::ZipArchive;

use super::types::{ArchiveEntry, ArchiveError};
use super::{read_slice, ArchiveDecoder, ReadSeek};

/// Decodes zip archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipDecoder;

impl ZipDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn decode_err(e: zip::result::ZipError) -> ArchiveError {
    ArchiveError::Decode(e.to_string())
}

/// Failures while inflating an entry mean its data is corrupt.
fn entry_err(index: usize, e: std::io::Error) -> ArchiveError {
    ArchiveError::Decode(format!("entry {}: {}", index, e))
}

impl ArchiveDecoder for ZipDecoder {
    fn name(&self) -> &str {
        "zip"
    }

    fn handles(&self, filename: &str) -> bool {
        filename.to_lowercase().ends_with(".zip")
    }

    fn entries(&self, source: &mut dyn ReadSeek) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = ZipArchive::new(source).map_err(decode_err)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index).map_err(decode_err)?;
            if file.is_dir() {
                continue;
            }
            entries.push(ArchiveEntry::new(index, file.name(), file.size()));
        }
        Ok(entries)
    }

    fn read_entry(
        &self,
        source: &mut dyn ReadSeek,
        index: usize,
        slice_size: usize,
        sink: &mut dyn FnMut(Vec<u8>) -> Result<(), ArchiveError>,
    ) -> Result<u64, ArchiveError> {
        let mut archive = ZipArchive::new(source).map_err(decode_err)?;
        if index >= archive.len() {
            return Err(ArchiveError::EntryNotFound(index));
        }
        let mut file = archive.by_index(index).map_err(decode_err)?;
        let expected = file.size();
        let slice_size = slice_size.max(1);

        let mut total = 0u64;
        while total < expected {
            let len = (expected - total).min(slice_size as u64) as usize;
            let buf = read_slice(&mut file, len).map_err(|e| entry_err(index, e))?;
            if buf.is_empty() {
                break;
            }
            total += buf.len() as u64;
            sink(buf)?;
        }

        if total != expected {
            return Err(ArchiveError::Truncated {
                index,
                expected,
                actual: total,
            });
        }

        // The entry's CRC is only checked by the read that reports its end.
        let mut tail = [0u8; 1];
        loop {
            match file.read(&mut tail) {
                Ok(0) => break,
                Ok(_) => {
                    return Err(ArchiveError::Decode(format!(
                        "entry {} is longer than its declared {} bytes",
                        index, expected
                    )))
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(entry_err(index, e)),
            }
        }
        Ok(total)
    }
}
