//! Title catalog - metadata for every installed title.
//!
//! A record is only written once all of its payload chunks are committed, so
//! every record in the catalog points at a complete set of chunks.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalogStore;
pub use types::*;

use async_trait::async_trait;

/// Trait for title catalog storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or replace a record, keyed by its id.
    async fn put(&self, record: &TitleRecord) -> Result<(), CatalogError>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> Result<Option<TitleRecord>, CatalogError>;

    /// All records, in no particular order.
    async fn list(&self) -> Result<Vec<TitleRecord>, CatalogError>;

    /// Delete a record. Returns `NotFound` if the id is unknown.
    async fn delete(&self, id: &str) -> Result<(), CatalogError>;

    /// Delete every record.
    async fn clear(&self) -> Result<(), CatalogError>;

    /// Flush pending writes before shutdown.
    async fn flush(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}
