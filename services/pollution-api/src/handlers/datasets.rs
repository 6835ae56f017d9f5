//! Dataset listing, switching and upload.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Extension, Multipart,
    },
    http::StatusCode,
    Json,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use pollution_protocol::{DatasetListResponse, DatasetSwitchRequest, DatasetSwitchResponse, UploadResponse};

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the dataset file.
pub const UPLOAD_FIELD: &str = "file";

/// GET /pollution/datasets
pub async fn list_handler(Extension(state): Extension<Arc<AppState>>) -> Result<Json<DatasetListResponse>, ApiError> {
    metrics::record_request("datasets");
    Ok(Json(DatasetListResponse {
        datasets: state.registry.list()?,
        current: state.registry.current_id(),
    }))
}

/// PUT /pollution/datasets/current
pub async fn switch_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<DatasetSwitchRequest>, JsonRejection>,
) -> Result<Json<DatasetSwitchResponse>, ApiError> {
    metrics::record_request("switch_dataset");
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let outcome = state.registry.set_current(request.name.trim()).await?;
    metrics::record_swap();

    Ok(Json(DatasetSwitchResponse {
        current: outcome.current,
        previous: outcome.previous,
    }))
}

/// POST /pollution/upload
///
/// Streams the `file` field to a hidden staging file in the data
/// directory, then hands it to the registry, which validates it before
/// moving it into place and activating it.
pub async fn upload_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    metrics::record_request("upload");
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::BadRequest("upload has no file name".to_string()))?;
        if !state.config.upload.allows(&file_name) {
            return Err(ApiError::BadRequest(format!(
                "'{}' does not have an accepted extension ({})",
                file_name,
                state.config.upload.extensions.join(", ")
            )));
        }

        let data_dir = state.registry.data_dir();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("cannot create data directory: {}", e)))?;
        let staged = data_dir.join(format!(".upload-{}.part", Uuid::new_v4()));

        let bytes = match stage(field, &staged, state.config.upload.max_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_quietly(&staged).await;
                return Err(e);
            }
        };

        let outcome = match state.registry.install_upload(&staged, &file_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_quietly(&staged).await;
                return Err(e.into());
            }
        };
        metrics::record_swap();
        info!(dataset = %outcome.current, bytes, "Upload activated");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "Dataset uploaded and activated".to_string(),
                dataset: outcome.current,
                bytes,
            }),
        ));
    }

    Err(ApiError::BadRequest(format!("missing multipart field '{}'", UPLOAD_FIELD)))
}

async fn stage(mut field: Field<'_>, staged: &Path, max_bytes: u64) -> Result<u64, ApiError> {
    let io_error = |e: std::io::Error| ApiError::Internal(format!("cannot stage upload: {}", e));

    let mut file = tokio::fs::File::create(staged).await.map_err(io_error)?;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "upload exceeds the limit of {} bytes",
                max_bytes
            )));
        }
        file.write_all(&chunk).await.map_err(io_error)?;
    }
    file.sync_all().await.map_err(io_error)?;
    Ok(written)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged upload"),
    }
}
