//! Configuration management for the Invitation API
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use invitation_pipeline::{FileStore, PipelineSettings};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Redis connection URL
    pub redis_url: String,

    /// Keep records in process memory instead of Redis (development only)
    pub in_memory_store: bool,

    /// Directory for uploaded spreadsheets
    pub uploads_dir: PathBuf,

    /// Directory for generated invitation images
    pub images_dir: PathBuf,

    /// Scratch directory for images being written
    pub temp_dir: PathBuf,

    /// Background image for every invitation
    pub template_path: PathBuf,

    /// Font used for guest names
    pub font_path: PathBuf,

    /// Upper bound on one batch run
    pub pipeline_timeout_secs: u64,

    /// Invitations rendered concurrently
    pub render_workers: usize,

    /// Largest accepted upload
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            in_memory_store: env::var("IN_MEMORY_STORE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid IN_MEMORY_STORE (expected true/false)")?,

            uploads_dir: env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "./data/excel".to_string())
                .into(),

            images_dir: env::var("IMAGES_DIR")
                .unwrap_or_else(|_| "./data/images".to_string())
                .into(),

            temp_dir: env::var("TEMP_DIR")
                .unwrap_or_else(|_| "./data/temp".to_string())
                .into(),

            template_path: env::var("TEMPLATE_PATH")
                .unwrap_or_else(|_| "./assets/asset.jpeg".to_string())
                .into(),

            font_path: env::var("FONT_PATH")
                .unwrap_or_else(|_| {
                    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf".to_string()
                })
                .into(),

            pipeline_timeout_secs: env::var("PIPELINE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid PIPELINE_TIMEOUT_SECS")?,

            render_workers: env::var("RENDER_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("Invalid RENDER_WORKERS")?,

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid MAX_UPLOAD_BYTES")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.pipeline_timeout_secs == 0 {
            anyhow::bail!("PIPELINE_TIMEOUT_SECS must be greater than 0");
        }

        if self.render_workers == 0 {
            anyhow::bail!("RENDER_WORKERS must be greater than 0");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(
            self.uploads_dir.clone(),
            self.images_dir.clone(),
            self.temp_dir.clone(),
            self.template_path.clone(),
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            timeout: Duration::from_secs(self.pipeline_timeout_secs),
            render_workers: self.render_workers,
        }
    }
}
