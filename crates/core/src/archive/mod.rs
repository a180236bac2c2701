//! Archive extraction for compressed disc images.
//!
//! Decoders are synchronous and meant to run on the blocking pool. They
//! either list an archive's directory or stream one entry out in slices, so
//! a large entry never has to be held in memory at once.

mod extractor;
mod types;
mod zip_decoder;

pub use extractor::ArchiveExtractor;
pub use types::*;
pub use zip_decoder::ZipDecoder;

use std::io::{Read, Seek};

/// Readable and seekable source an archive is decoded from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Read up to `len` bytes, returning fewer only at end of input.
pub(crate) fn read_slice<R: Read + ?Sized>(
    reader: &mut R,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    (&mut *reader).take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// A decoder for one archive format.
pub trait ArchiveDecoder: Send + Sync {
    /// Returns the name of this decoder.
    fn name(&self) -> &str;

    /// Whether this decoder is responsible for `filename`.
    fn handles(&self, filename: &str) -> bool;

    /// List the archive's file entries, skipping directories.
    fn entries(&self, source: &mut dyn ReadSeek) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Decompress entry `index`, handing it to `sink` in slices of at most
    /// `slice_size` bytes. Returns the number of bytes produced.
    ///
    /// A sink error stops decoding and is returned as-is.
    fn read_entry(
        &self,
        source: &mut dyn ReadSeek,
        index: usize,
        slice_size: usize,
        sink: &mut dyn FnMut(Vec<u8>) -> Result<(), ArchiveError>,
    ) -> Result<u64, ArchiveError>;
}
