//! Invitation REST API
//!
//! HTTP front end for the invitation pipeline. A client uploads a guest
//! spreadsheet, the service registers every guest, renders one QR-coded
//! invitation per guest and answers with the spreadsheet extended by the
//! generated guest ids.
//!
//! ## Endpoints
//!
//! - `POST /api/invitations?invitation_name=...` - Run a batch (multipart field `file`)
//! - `GET /api/spreadsheets` - List stored spreadsheets
//! - `GET /api/spreadsheets/{name}` - Download a spreadsheet
//! - `GET /api/batches` - List batch runs
//! - `GET /api/batches/{run_id}` - Get one batch run
//! - `GET /api/batches/{run_id}/images` - List the images of a run
//! - `GET /api/batches/{run_id}/images/{image_name}` - Download an image
//! - `GET /api/guests/{guest_id}` - Get a guest record
//! - `GET /health` - Health check

pub mod config;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use invitation_pipeline::InvitationPipeline;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: InvitationPipeline,

    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: InvitationPipeline, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            max_upload_bytes,
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    let state = Arc::new(state);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        // Batch processing
        .route(
            "/api/invitations",
            post(handlers::process_invitation_handler),
        )
        // Spreadsheets
        .route("/api/spreadsheets", get(handlers::list_spreadsheets_handler))
        .route(
            "/api/spreadsheets/{name}",
            get(handlers::get_spreadsheet_handler),
        )
        // Batch runs and their images
        .route("/api/batches", get(handlers::list_batches_handler))
        .route("/api/batches/{run_id}", get(handlers::get_batch_handler))
        .route(
            "/api/batches/{run_id}/images",
            get(handlers::list_batch_images_handler),
        )
        .route(
            "/api/batches/{run_id}/images/{image_name}",
            get(handlers::get_image_handler),
        )
        // Guests
        .route("/api/guests/{guest_id}", get(handlers::get_guest_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
