//! Batch run records
//!
//! A batch is one pipeline run for one uploaded guest list. The record
//! stores the paths of everything the run writes, so nothing has to be
//! recovered by parsing directory names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Batch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Spreadsheet saved, not yet parsed
    Uploaded,
    /// Rows read from the spreadsheet
    Parsed,
    /// Guest records written
    GuestsRegistered,
    /// Invitation images are being rendered
    ImagesGenerating,
    /// Every image written
    Completed,
    /// Run aborted; artifacts removed
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        use BatchStatus::*;

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Uploaded, Parsed)
            | (Parsed, GuestsRegistered)
            | (GuestsRegistered, ImagesGenerating)
            | (ImagesGenerating, Completed) => true,
            _ => false,
        }
    }
}

/// Stored record of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Unique run identifier (hex UUID)
    pub run_id: String,

    /// Invitation/event name supplied with the upload
    pub invitation_name: String,

    pub status: BatchStatus,

    /// Where the uploaded (and later updated) spreadsheet lives
    pub spreadsheet_path: String,

    /// Directory holding this run's invitation images
    pub images_dir: String,

    /// Number of guest rows read
    pub guest_count: usize,

    /// Guest identifiers in spreadsheet order
    #[serde(default)]
    pub guest_ids: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchRecord {
    /// Create a new record in the `Uploaded` state
    pub fn new(
        run_id: String,
        invitation_name: String,
        spreadsheet_path: String,
        images_dir: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            invitation_name,
            status: BatchStatus::Uploaded,
            spreadsheet_path,
            images_dir,
            guest_count: 0,
            guest_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    fn advance(&mut self, next: BatchStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_parsed(&mut self, guest_count: usize) -> Result<()> {
        self.advance(BatchStatus::Parsed)?;
        self.guest_count = guest_count;
        Ok(())
    }

    pub fn mark_registered(&mut self, guest_ids: Vec<String>) -> Result<()> {
        self.advance(BatchStatus::GuestsRegistered)?;
        self.guest_ids = guest_ids;
        Ok(())
    }

    pub fn mark_generating(&mut self) -> Result<()> {
        self.advance(BatchStatus::ImagesGenerating)
    }

    pub fn mark_completed(&mut self) -> Result<()> {
        self.advance(BatchStatus::Completed)?;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// Mark the batch as failed. Guest ids are dropped since the run's
    /// guests are rolled back with it.
    pub fn mark_failed(&mut self, error: String) -> Result<()> {
        self.advance(BatchStatus::Failed)?;
        self.completed_at = Some(self.updated_at);
        self.guest_ids.clear();
        self.error = Some(error);
        Ok(())
    }
}
