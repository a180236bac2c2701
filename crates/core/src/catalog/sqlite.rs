//! SQLite-backed title catalog.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{CatalogError, CatalogStore, FileEntry, FileType, TitleRecord};

/// Schema version written by this build.
const SCHEMA_VERSION: i64 = 2;

/// Additive migrations, applied in order to databases older than their version.
const MIGRATIONS: &[(i64, &str)] = &[(2, "ALTER TABLE titles ADD COLUMN main_file_name TEXT")];

/// SQLite-backed title catalog.
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open (or create) the catalog database at `path`.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS titles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                region TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_type TEXT NOT NULL,
                files TEXT NOT NULL DEFAULT '[]',
                installed_date TEXT NOT NULL,
                last_played TEXT,
                play_count INTEGER NOT NULL DEFAULT 0,
                is_compressed INTEGER NOT NULL DEFAULT 0,
                use_chunks INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_titles_installed ON titles(installed_date);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        let current: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let current = match current {
            Some(v) => v,
            None => {
                // A database without a version row predates versioning.
                let has_column = Self::has_column(conn, "titles", "main_file_name")?;
                if has_column {
                    SCHEMA_VERSION
                } else {
                    1
                }
            }
        };

        for (version, sql) in MIGRATIONS {
            if *version > current {
                info!(version, "Migrating catalog schema");
                conn.execute(sql, [])
                    .map_err(|e| CatalogError::Database(e.to_string()))?;
            }
        }

        if current != SCHEMA_VERSION {
            conn.execute("DELETE FROM schema_version", [])
                .map_err(|e| CatalogError::Database(e.to_string()))?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?)",
                params![SCHEMA_VERSION],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        Ok(())
    }

    fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, CatalogError> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(names.iter().any(|n| n == column))
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64, CatalogError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CatalogError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| CatalogError::Internal(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| CatalogError::Internal(e.to_string()))?
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TitleRecord> {
        let file_type: String = row.get(5)?;
        let files_json: String = row.get(6)?;
        let installed_str: String = row.get(7)?;
        let last_played_str: Option<String> = row.get(8)?;

        let files: Vec<FileEntry> = serde_json::from_str(&files_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let installed_date = parse_timestamp(7, &installed_str)?;
        let last_played = last_played_str
            .as_deref()
            .map(|s| parse_timestamp(8, s))
            .transpose()?;

        Ok(TitleRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            region: row.get(2)?,
            original_filename: row.get(3)?,
            file_size: row.get::<_, i64>(4)? as u64,
            file_type: FileType::parse(&file_type),
            files,
            installed_date,
            last_played,
            play_count: row.get::<_, i64>(9)? as u32,
            is_compressed: row.get(10)?,
            use_chunks: row.get(11)?,
            main_file_name: row.get(12)?,
        })
    }
}

fn parse_timestamp(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Undecodable stored values are a serialization problem, not a database one.
fn read_err(e: rusqlite::Error) -> CatalogError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
            CatalogError::Serialization(format!("column {}: {}", column, source))
        }
        other => CatalogError::Database(other.to_string()),
    }
}

const SELECT_COLUMNS: &str = "id, name, region, original_filename, file_size, file_type, files, \
     installed_date, last_played, play_count, is_compressed, use_chunks, main_file_name";

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn put(&self, record: &TitleRecord) -> Result<(), CatalogError> {
        let record = record.clone();
        let files_json = serde_json::to_string(&record.files)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO titles
                    (id, name, region, original_filename, file_size, file_type, files,
                     installed_date, last_played, play_count, is_compressed, use_chunks,
                     main_file_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    record.id,
                    record.name,
                    record.region,
                    record.original_filename,
                    record.file_size as i64,
                    record.file_type.as_str(),
                    files_json,
                    record.installed_date.to_rfc3339(),
                    record.last_played.map(|t| t.to_rfc3339()),
                    record.play_count as i64,
                    record.is_compressed,
                    record.use_chunks,
                    record.main_file_name,
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
            debug!(id = %record.id, "Stored title record");
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<TitleRecord>, CatalogError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM titles WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()
            .map_err(read_err)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<TitleRecord>, CatalogError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM titles", SELECT_COLUMNS))
                .map_err(|e| CatalogError::Database(e.to_string()))?;
            let rows = stmt
                .query_map([], Self::row_to_record)
                .map_err(|e| CatalogError::Database(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(read_err)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM titles WHERE id = ?", params![id])
                .map_err(|e| CatalogError::Database(e.to_string()))?;
            if deleted == 0 {
                return Err(CatalogError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), CatalogError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM titles", [])
                .map_err(|e| CatalogError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> Result<(), CatalogError> {
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(|e| CatalogError::Database(e.to_string()))
        })
        .await
    }
}
