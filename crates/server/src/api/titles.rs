//! Title library API handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use discvault_core::{
    InstallError, InstallRequest, InstallSource, LibraryError, LibraryStats, TitleRecord,
};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TitleListResponse {
    pub titles: Vec<TitleRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub id: String,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub title: TitleRecord,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: LibraryStats,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn library_error(e: LibraryError) -> ApiError {
    let status = match &e {
        LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_corrupt() => StatusCode::CONFLICT,
        LibraryError::Install(InstallError::NoPlayableEntry { .. })
        | LibraryError::Install(InstallError::Extraction { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LibraryError::Install(InstallError::SourceRead { .. }) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/titles
///
/// List installed titles, most recently active first.
pub async fn list_titles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TitleListResponse>, ApiError> {
    let titles = state.library().list().await.map_err(library_error)?;
    let total = titles.len();
    Ok(Json(TitleListResponse { titles, total }))
}

/// GET /api/v1/titles/{id}
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TitleRecord>, ApiError> {
    let record = state.library().get(&id).await.map_err(library_error)?;
    Ok(Json(record))
}

/// An upload spooled to disk.
struct Upload {
    filename: String,
    size: u64,
    file: NamedTempFile,
}

async fn spool_upload(mut field: Field<'_>, dir: &FsPath) -> Result<Upload, ApiError> {
    let filename = field
        .file_name()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Uploaded file has no filename"))?;

    let internal = |e: std::io::Error| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to spool upload: {}", e),
        )
    };

    let spool = tempfile::Builder::new()
        .prefix("discvault-upload-")
        .suffix(".spool")
        .tempfile_in(dir)
        .map_err(internal)?;
    let mut writer = tokio::fs::File::from_std(spool.reopen().map_err(internal)?);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to read file: {}", e),
        )
    })? {
        writer.write_all(&chunk).await.map_err(internal)?;
        size += chunk.len() as u64;
    }
    writer.flush().await.map_err(internal)?;

    Ok(Upload {
        filename,
        size,
        file: spool,
    })
}

/// Read a text field, trimmed. Blank values count as absent.
async fn read_text_field(field: Field<'_>) -> Result<Option<String>, ApiError> {
    let field_name = field.name().unwrap_or("").to_string();
    let text = field.text().await.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to read field {}: {}", field_name, e),
        )
    })?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// POST /api/v1/titles
///
/// Install a title from a multipart upload with fields `file`, `name`
/// and `region`. The file is spooled to disk before installing.
pub async fn install_title(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TitleRecord>), ApiError> {
    let spool_dir = state
        .config()
        .install
        .spool_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);

    let mut upload: Option<Upload> = None;
    let mut name: Option<String> = None;
    let mut region: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid multipart body: {}", e),
        )
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => upload = Some(spool_upload(field, &spool_dir).await?),
            "name" => name = read_text_field(field).await?.or(name),
            "region" => region = read_text_field(field).await?.or(region),
            _ => {}
        }
    }

    let upload = match upload {
        Some(u) if u.size > 0 => u,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "No file provided")),
    };

    let name = name.unwrap_or_else(|| {
        FsPath::new(&upload.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| upload.filename.clone())
    });
    let region = region.unwrap_or_else(|| "Unknown".to_string());

    let reader = tokio::fs::File::open(upload.file.path())
        .await
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to reopen upload: {}", e),
            )
        })?;
    let source = InstallSource::new(upload.filename.clone(), upload.size, reader);

    info!(filename = %upload.filename, size = upload.size, "Installing upload");
    let record = state
        .library()
        .install(InstallRequest::new(source, name, region))
        .await
        .map_err(library_error)?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/v1/titles/{id}
///
/// Remove a title. Unknown ids are not an error.
pub async fn remove_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let removed = state.library().remove(&id).await.map_err(library_error)?;
    Ok(Json(RemoveResponse { id, removed }))
}

/// DELETE /api/v1/titles
///
/// Remove every title.
pub async fn clear_titles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.library().clear().await.map_err(library_error)?;
    Ok(Json(SuccessResponse {
        message: "Library cleared".to_string(),
    }))
}

/// POST /api/v1/titles/{id}/play
///
/// Reassemble a title and hand it to the emulator.
pub async fn play_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PlayResponse>, ApiError> {
    match state.library().play(&id).await {
        Ok(outcome) => Ok(Json(PlayResponse {
            title: outcome.record,
            bytes: outcome.receipt.bytes,
            location: outcome
                .receipt
                .location
                .map(|p| p.to_string_lossy().to_string()),
        })),
        Err(e) => {
            if e.is_corrupt() {
                warn!(title_id = %id, error = %e, "Stored title is corrupt");
            }
            Err(library_error(e))
        }
    }
}

/// GET /api/v1/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state
        .library()
        .storage_summary()
        .await
        .map_err(library_error)?;
    let summary = stats.summary();
    Ok(Json(StatsResponse { stats, summary }))
}
