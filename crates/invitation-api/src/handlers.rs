//! API request handlers for the Invitation API

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use invitation_common::{BatchRecord, Error, Guest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Response header carrying the run id of a processed batch
pub const RUN_ID_HEADER: &str = "x-run-id";

/// Multipart field holding the uploaded spreadsheet
const UPLOAD_FIELD: &str = "file";

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: &'static str,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: "malformed_input",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "kind": self.kind,
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }

        ApiError {
            status,
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Query parameters of the batch upload
#[derive(Debug, Deserialize)]
pub struct ProcessInvitationQuery {
    pub invitation_name: String,
}

/// File names in a folder
#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
    pub total: usize,
}

impl From<Vec<String>> for FilesResponse {
    fn from(files: Vec<String>) -> Self {
        let total = files.len();
        Self { files, total }
    }
}

/// Invitation images of one batch
#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub run_id: String,
    pub images: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchesResponse {
    pub batches: Vec<BatchRecord>,
    pub total: usize,
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "invitation-api"
    }))
}

/// Run a full invitation batch from an uploaded spreadsheet
///
/// Responds with the updated spreadsheet as an attachment. The run id is
/// returned in the `x-run-id` header so the images can be fetched later.
pub async fn process_invitation_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessInvitationQuery>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let invitation_name = query.invitation_name.trim();
    info!("Processing invitation batch: {}", invitation_name);

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        upload = Some(bytes);
        break;
    }

    let upload = upload.ok_or_else(|| {
        ApiError::bad_request(format!("Missing multipart field '{}'", UPLOAD_FIELD))
    })?;

    let outcome = state
        .pipeline
        .run_invitation_batch(&upload, invitation_name)
        .await?;

    info!(
        "Batch {} finished with {} invitations",
        outcome.run_id, outcome.guest_count
    );

    file_response(
        XLSX_CONTENT_TYPE,
        &outcome.spreadsheet_name,
        outcome.spreadsheet,
        Some(&outcome.run_id),
    )
}

/// List stored spreadsheets
pub async fn list_spreadsheets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilesResponse>, ApiError> {
    info!("Listing spreadsheets");
    Ok(Json(state.pipeline.list_spreadsheets()?.into()))
}

/// Download one stored spreadsheet
pub async fn get_spreadsheet_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    info!("Getting spreadsheet: {}", name);
    let bytes = state.pipeline.get_spreadsheet(&name)?;
    file_response(XLSX_CONTENT_TYPE, &name, bytes, None)
}

/// List batch runs, newest first
pub async fn list_batches_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BatchesResponse>, ApiError> {
    info!("Listing batches");
    let batches = state.pipeline.list_batches().await?;
    let total = batches.len();
    Ok(Json(BatchesResponse { batches, total }))
}

pub async fn get_batch_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<BatchRecord>, ApiError> {
    info!("Getting batch: {}", run_id);
    Ok(Json(state.pipeline.get_batch(&run_id).await?))
}

/// List the invitation images of a batch
pub async fn list_batch_images_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<ImagesResponse>, ApiError> {
    info!("Listing images of batch: {}", run_id);
    let images = state.pipeline.get_batch_images(&run_id).await?;
    let total = images.len();
    Ok(Json(ImagesResponse {
        run_id,
        images,
        total,
    }))
}

/// Download one invitation image
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    Path((run_id, image_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    info!("Getting image {} of batch {}", image_name, run_id);
    let bytes = state.pipeline.get_image(&run_id, &image_name).await?;
    file_response("image/png", &download_name(&image_name), bytes, None)
}

pub async fn get_guest_handler(
    State(state): State<Arc<AppState>>,
    Path(guest_id): Path<String>,
) -> Result<Json<Guest>, ApiError> {
    info!("Getting guest: {}", guest_id);
    Ok(Json(state.pipeline.get_guest(&guest_id).await?))
}

/// Name offered to the client for an image: the `_<guest_id>` suffix is dropped.
///
/// `4821-Jane Doe_5f0c....png` becomes `4821-Jane Doe.png`.
pub fn download_name(image_name: &str) -> String {
    let stem = image_name.strip_suffix(".png").unwrap_or(image_name);
    match stem.rsplit_once('_') {
        Some((prefix, _)) if !prefix.is_empty() => format!("{}.png", prefix),
        _ => image_name.to_string(),
    }
}

/// `Content-Disposition` value that survives non-ASCII file names
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == file_name {
        return format!("attachment; filename=\"{}\"", file_name);
    }

    let mut encoded = String::new();
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

fn file_response(
    content_type: &str,
    file_name: &str,
    bytes: Vec<u8>,
    run_id: Option<&str>,
) -> Result<Response, ApiError> {
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition(file_name));
    if let Some(run_id) = run_id {
        builder = builder.header(RUN_ID_HEADER, run_id);
    }

    builder.body(Body::from(bytes)).map_err(|e| {
        warn!("Failed to build file response for {}: {}", file_name, e);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Failed to build response: {}", e),
            kind: "processing",
        }
    })
}
