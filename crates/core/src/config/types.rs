use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Which chunk store implementation backs the library.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Chunks live in the same SQLite database as the catalog.
    #[default]
    Sqlite,
    /// Chunks live as individual files under `chunk_dir`.
    Fs,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
    /// Root directory for chunk files (fs backend only).
    #[serde(default = "default_chunk_dir")]
    pub chunk_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_db_path(),
            chunk_dir: default_chunk_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("discvault.db")
}

fn default_chunk_dir() -> PathBuf {
    PathBuf::from("chunks")
}

/// Install pipeline tuning.
///
/// Both sizes only affect new installs. Every chunked title records the
/// chunk size it was written with, so changing them never invalidates data
/// already on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstallConfig {
    /// Slice size for chunked installs, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Sources at or below this size are installed in one piece.
    #[serde(default = "default_small_file_threshold")]
    pub small_file_threshold: u64,
    /// Where large archives are spooled while their directory is decoded.
    /// Falls back to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            small_file_threshold: default_small_file_threshold(),
            spool_dir: None,
        }
    }
}

impl InstallConfig {
    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the small-file threshold.
    pub fn with_small_file_threshold(mut self, threshold: u64) -> Self {
        self.small_file_threshold = threshold;
        self
    }

    /// Sets the spool directory.
    pub fn with_spool_dir(mut self, path: PathBuf) -> Self {
        self.spool_dir = Some(path);
        self
    }
}

fn default_chunk_size() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

fn default_small_file_threshold() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

/// Emulator hand-off configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmulatorConfig {
    /// Directory the reconstructed image is exported to on play.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("boot")
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
        }
    }
}

fn default_duration_ms() -> u64 {
    5000
}

/// Sanitized config for API responses (local paths reduced to file names)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage_backend: StorageBackend,
    pub install: SanitizedInstallConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedInstallConfig {
    pub chunk_size: usize,
    pub small_file_threshold: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage_backend: config.storage.backend,
            install: SanitizedInstallConfig {
                chunk_size: config.install.chunk_size,
                small_file_threshold: config.install.small_file_threshold,
            },
        }
    }
}
