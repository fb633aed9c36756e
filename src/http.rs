//! HTTP front end: `POST /api/ocr` multipart upload → Markdown JSON.
//!
//! Exactly one uploaded file per request, at most 10 MiB, MIME-restricted to
//! JPEG / PNG / PDF. Validation happens before the pipeline runs; the upload
//! lives in an auto-deleted temp file under the shared working directory, so
//! it is gone when the request completes whatever the outcome.

use crate::config::MAX_UPLOAD_BYTES;
use crate::process::{FilePipeline, SourceKind};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the HTTP front end.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FilePipeline>,
}

/// Successful conversion body.
#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub markdown: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn server_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ocr", post(ocr_handler))
        // Body cap slightly above the file limit to leave room for the
        // multipart framing; the per-file check below owns the user-facing
        // error message.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ocr_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let mut upload: Option<(SourceKind, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let kind = SourceKind::from_mime(&content_type).ok_or_else(|| {
            ApiError::bad_request("Invalid file type. Only JPG, PNG and PDF files are allowed.")
        })?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;

        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::bad_request(format!(
                "File too large: limit is {} MiB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        upload = Some((kind, data));
        break;
    }

    let (kind, data) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let work_dir = state.pipeline.work_dir().to_path_buf();
    std::fs::create_dir_all(&work_dir)
        .map_err(|e| ApiError::server_error(format!("working directory unavailable: {e}")))?;

    // NamedTempFile: unlinked on drop, so the upload never outlives the
    // request on success or failure paths.
    let mut temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", kind.extension()))
        .tempfile_in(&work_dir)
        .map_err(|e| ApiError::server_error(format!("cannot stage upload: {e}")))?;
    temp.write_all(&data)
        .map_err(|e| ApiError::server_error(format!("cannot stage upload: {e}")))?;

    info!(
        size = data.len(),
        kind = ?kind,
        "Processing uploaded file"
    );

    match state.pipeline.process_file(temp.path()).await {
        Ok(markdown) => Ok(Json(OcrResponse { markdown })),
        Err(e) => {
            error!("Upload processing failed: {e}");
            Err(ApiError::server_error(e.to_string()))
        }
    }
}
