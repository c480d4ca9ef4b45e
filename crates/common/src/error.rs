use thiserror::Error;

use crate::batch::BatchStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid batch transition from {from:?} to {to:?}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "malformed_input",
            Error::Persistence(_) => "persistence",
            Error::Render(_) => "render",
            Error::Processing(_) => "processing",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::JsonSerialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }

    /// Collapse anything outside the pipeline taxonomy into `Processing`
    pub fn into_pipeline_error(self) -> Self {
        match self {
            e @ (Error::MalformedInput(_)
            | Error::Persistence(_)
            | Error::Render(_)
            | Error::Processing(_)
            | Error::NotFound(_)) => e,
            other => Error::Processing(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
