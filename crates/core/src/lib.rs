pub mod archive;
pub mod catalog;
pub mod chunks;
pub mod config;
pub mod emulator;
pub mod install;
pub mod library;
pub mod metrics;
pub mod notify;
pub mod testing;

pub use archive::{ArchiveDecoder, ArchiveEntry, ArchiveError, ArchiveExtractor, ZipDecoder};
pub use catalog::{
    display_order, new_title_id, CatalogError, CatalogStore, ChunkBounds, ChunkInfo, FileEntry,
    FileType, SqliteCatalogStore, TitleRecord,
};
pub use chunks::{ChunkError, ChunkRecord, ChunkStore, FsChunkStore, SqliteChunkStore};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, InstallConfig,
    SanitizedConfig, StorageBackend, StorageConfig,
};
pub use emulator::{BootImage, BootReceipt, Emulator, EmulatorError, ExportEmulator};
pub use install::{
    CancelHandle, InstallError, InstallKind, InstallPipeline, InstallProgress, InstallRequest,
    InstallSource, InstallStage,
};
pub use library::{
    open_stores, AssemblyError, Library, LibraryError, LibraryStats, PlayOutcome,
    RetrievalAssembler, Stores,
};
pub use notify::{
    create_notification_system, ChannelNotifier, NoopNotifier, Notification, NotificationLevel,
    NotificationLog, Notifier, TracingNotifier,
};
