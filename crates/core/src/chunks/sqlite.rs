//! SQLite-backed chunk store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ChunkError, ChunkRecord, ChunkStore};

/// SQLite-backed chunk store.
///
/// Runs in WAL mode with `synchronous = FULL`, so a committed `put` is on
/// disk before it returns.
pub struct SqliteChunkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChunkStore {
    /// Open (or create) the chunk database at `path`.
    pub fn new(path: &Path) -> Result<Self, ChunkError> {
        let conn = Connection::open(path).map_err(|e| ChunkError::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| ChunkError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory chunk store (useful for testing).
    pub fn in_memory() -> Result<Self, ChunkError> {
        let conn = Connection::open_in_memory().map_err(|e| ChunkError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ChunkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                title_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                data BLOB NOT NULL,
                written_at TEXT NOT NULL,
                PRIMARY KEY (title_id, chunk_index)
            );
            "#,
        )
        .map_err(|e| ChunkError::Database(e.to_string()))?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, ChunkError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, ChunkError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| ChunkError::Internal(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| ChunkError::Internal(e.to_string()))?
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, title_id: &str, index: u32, data: Vec<u8>) -> Result<(), ChunkError> {
        let title_id = title_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO chunks (title_id, chunk_index, data, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![title_id, index, data, Utc::now().to_rfc3339()],
            )
            .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, title_id: &str, index: u32) -> Result<Option<ChunkRecord>, ChunkError> {
        let title_id = title_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT data, written_at FROM chunks WHERE title_id = ?1 AND chunk_index = ?2",
                params![title_id, index],
                |row| {
                    let data: Vec<u8> = row.get(0)?;
                    let written_at: String = row.get(1)?;
                    Ok((data, written_at))
                },
            )
            .optional()
            .map_err(|e| ChunkError::Database(e.to_string()))?
            .map(|(data, written_at)| -> Result<ChunkRecord, ChunkError> {
                let written_at = DateTime::parse_from_rfc3339(&written_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        ChunkError::Database(format!(
                            "invalid written_at for {} part {}: {}",
                            title_id, index, e
                        ))
                    })?;
                Ok(ChunkRecord {
                    title_id: title_id.clone(),
                    index,
                    data,
                    written_at,
                })
            })
            .transpose()
        })
        .await
    }

    async fn delete_all(&self, title_id: &str) -> Result<u64, ChunkError> {
        let title_id = title_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM chunks WHERE title_id = ?", params![title_id])
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(removed as u64)
        })
        .await
    }

    async fn count(&self, title_id: &str) -> Result<u64, ChunkError> {
        let title_id = title_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chunks WHERE title_id = ?",
                    params![title_id],
                    |row| row.get(0),
                )
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn total_count(&self) -> Result<u64, ChunkError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn title_ids(&self) -> Result<Vec<String>, ChunkError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT DISTINCT title_id FROM chunks ORDER BY title_id")
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| ChunkError::Database(e.to_string()))?
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(ids)
        })
        .await
    }

    async fn clear(&self) -> Result<(), ChunkError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM chunks", [])
                .map_err(|e| ChunkError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), ChunkError> {
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(|e| ChunkError::Database(e.to_string()))
        })
        .await
    }
}
