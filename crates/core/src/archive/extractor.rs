//! Selects a decoder by file name and turns archives into playable entries.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{
    order_by_priority, ArchiveEntry, ArchiveError, Extraction, ExtractedEntry, Listing,
};
use super::{read_slice, ArchiveDecoder, ZipDecoder};
use crate::catalog::FileType;

/// Extracts disc payloads from archives.
///
/// Only allow-listed disc formats are kept. When an archive cannot be
/// decoded the source is kept whole, as a single opaque entry.
#[derive(Clone)]
pub struct ArchiveExtractor {
    decoders: Vec<Arc<dyn ArchiveDecoder>>,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractor {
    /// Creates an extractor that understands zip archives.
    pub fn new() -> Self {
        Self {
            decoders: vec![Arc::new(ZipDecoder::new())],
        }
    }

    /// Adds a decoder. Earlier decoders take precedence.
    pub fn with_decoder(mut self, decoder: Arc<dyn ArchiveDecoder>) -> Self {
        self.decoders.push(decoder);
        self
    }

    fn decoder_for(&self, filename: &str) -> Option<&dyn ArchiveDecoder> {
        self.decoders
            .iter()
            .find(|d| d.handles(filename))
            .map(|d| d.as_ref())
    }

    /// Whether `filename` names an archive this extractor can decode.
    pub fn is_archive(&self, filename: &str) -> bool {
        self.decoder_for(filename).is_some()
    }

    /// Extract an in-memory source. Never fails: undecodable archives and
    /// non-archives come back as one opaque entry holding `data`.
    pub fn extract(&self, filename: &str, data: Vec<u8>) -> Extraction {
        let Some(decoder) = self.decoder_for(filename) else {
            return Self::opaque(filename, data, FileType::from_filename(filename));
        };

        match Self::decode_all(decoder, &data) {
            Ok(entries) => {
                debug!(
                    filename,
                    decoder = decoder.name(),
                    kept = entries.len(),
                    "Extracted archive"
                );
                Extraction {
                    entries,
                    decoded: true,
                }
            }
            Err(e) => {
                warn!(filename, error = %e, "Archive could not be decoded, storing as-is");
                Self::opaque(filename, data, FileType::Other)
            }
        }
    }

    fn decode_all(
        decoder: &dyn ArchiveDecoder,
        data: &[u8],
    ) -> Result<Vec<ExtractedEntry>, ArchiveError> {
        let mut playable = Self::playable(decoder.entries(&mut Cursor::new(data))?);

        let mut extracted = Vec::with_capacity(playable.len());
        for entry in playable.drain(..) {
            let mut buf = Vec::with_capacity(entry.size as usize);
            decoder.read_entry(
                &mut Cursor::new(data),
                entry.index,
                entry.size.max(1) as usize,
                &mut |slice| {
                    buf.extend_from_slice(&slice);
                    Ok(())
                },
            )?;
            extracted.push(ExtractedEntry {
                filename: entry.filename,
                full_path: Some(entry.full_path),
                file_type: entry.file_type,
                data: buf,
            });
        }
        Ok(extracted)
    }

    fn playable(entries: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
        let mut playable: Vec<ArchiveEntry> = entries
            .into_iter()
            .filter(|e| e.file_type.is_disc_payload())
            .collect();
        order_by_priority(&mut playable, |e| e.file_type);
        playable
    }

    fn opaque(filename: &str, data: Vec<u8>, file_type: FileType) -> Extraction {
        Extraction {
            entries: vec![ExtractedEntry {
                filename: filename.to_string(),
                full_path: None,
                file_type,
                data,
            }],
            decoded: false,
        }
    }

    /// List the playable entries of an archive spooled at `path`.
    pub fn list_file(&self, filename: &str, path: &Path) -> Listing {
        let Some(decoder) = self.decoder_for(filename) else {
            return Listing::Opaque;
        };

        let entries = File::open(path)
            .map_err(ArchiveError::from)
            .and_then(|file| decoder.entries(&mut BufReader::new(file)));

        match entries {
            Ok(entries) => {
                let playable = Self::playable(entries);
                if playable.is_empty() {
                    Listing::Empty
                } else {
                    Listing::Playable(playable)
                }
            }
            Err(e) => {
                warn!(filename, error = %e, "Archive directory could not be decoded, storing as-is");
                Listing::Opaque
            }
        }
    }

    /// Stream one entry of the archive spooled at `path` into `sink`.
    pub fn read_file_entry(
        &self,
        filename: &str,
        path: &Path,
        index: usize,
        slice_size: usize,
        sink: &mut dyn FnMut(Vec<u8>) -> Result<(), ArchiveError>,
    ) -> Result<u64, ArchiveError> {
        let decoder = self
            .decoder_for(filename)
            .ok_or_else(|| ArchiveError::Decode(format!("no decoder for {}", filename)))?;
        let file = File::open(path)?;
        decoder.read_entry(&mut BufReader::new(file), index, slice_size, sink)
    }

    /// Stream the file at `path` into `sink` unchanged.
    pub fn read_file_raw(
        path: &Path,
        slice_size: usize,
        sink: &mut dyn FnMut(Vec<u8>) -> Result<(), ArchiveError>,
    ) -> Result<u64, ArchiveError> {
        let mut file = File::open(path)?;
        let slice_size = slice_size.max(1);
        let mut total = 0u64;
        loop {
            let buf = read_slice(&mut file, slice_size)?;
            if buf.is_empty() {
                break;
            }
            let last = buf.len() < slice_size;
            total += buf.len() as u64;
            sink(buf)?;
            if last {
                break;
            }
        }
        Ok(total)
    }
}
