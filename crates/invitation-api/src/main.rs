//! Invitation API Service
//!
//! REST API service for turning guest spreadsheets into QR invitations.

use anyhow::{Context, Result};
use invitation_api::{config::Config, create_router, AppState};
use invitation_pipeline::{
    Compositor, FontRenderer, GuestStore, InvitationPipeline, Layout, MemoryGuestStore,
    RedisGuestStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "invitation_api=debug,invitation_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Invitation API Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded - listening on {}",
        config.api_address()
    );

    // Ensure directories exist
    let files = config.file_store();
    files
        .ensure_directories()
        .context("Failed to create directories")?;
    info!("Uploads directory: {}", files.uploads_dir.display());
    info!("Images directory: {}", files.images_dir.display());
    info!("Template: {}", files.template_path.display());

    // Initialize storage
    let store: Arc<dyn GuestStore> = if config.in_memory_store {
        warn!("Using in-memory store, records are lost on restart");
        Arc::new(MemoryGuestStore::new())
    } else {
        info!("Redis URL: {}", config.redis_url);
        Arc::new(
            RedisGuestStore::new(&config.redis_url)
                .await
                .context("Failed to initialize storage")?,
        )
    };

    // Load the name font
    let font = FontRenderer::load(&config.font_path)
        .with_context(|| format!("Failed to load font {}", config.font_path.display()))?;
    let compositor = Compositor::new(Layout::default(), Arc::new(font));

    // Create application state
    let pipeline = InvitationPipeline::new(store, files, compositor, config.pipeline_settings());
    let state = AppState::new(pipeline, config.max_upload_bytes);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Invitation API listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());
    info!("API endpoints:");
    info!("  POST /api/invitations?invitation_name=... - Run an invitation batch");
    info!("  GET /api/spreadsheets - List spreadsheets");
    info!("  GET /api/spreadsheets/{{name}} - Download spreadsheet");
    info!("  GET /api/batches - List batches");
    info!("  GET /api/batches/{{run_id}} - Get batch");
    info!("  GET /api/batches/{{run_id}}/images - List batch images");
    info!("  GET /api/batches/{{run_id}}/images/{{image_name}} - Download image");
    info!("  GET /api/guests/{{guest_id}} - Get guest");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
