//! Install pipeline.
//!
//! Sources at or below the small-file threshold are read into memory,
//! unpacked if they are archives, and stored as a single blob. Larger
//! sources are streamed into fixed-size chunks; large archives are spooled
//! to disk first so only their main entry is decoded, one slice at a time.

mod error;
mod pipeline;
mod progress;
mod types;

pub use error::InstallError;
pub use pipeline::InstallPipeline;
pub use progress::ProgressReporter;
pub use types::*;
