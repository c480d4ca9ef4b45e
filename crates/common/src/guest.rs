//! Guest records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row read from an uploaded guest list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRow {
    /// Display name as written in the spreadsheet
    pub name: String,

    /// Guest code supplied by the host (not unique across events)
    pub code: i64,
}

impl GuestRow {
    pub fn new(name: impl Into<String>, code: i64) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }
}

/// Persisted invitee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    /// System-generated identifier
    pub id: String,

    pub name: String,

    pub code: i64,

    /// Invitation/event name grouping guests of one upload
    pub event_name: String,

    /// Batch run that created this guest
    pub run_id: String,

    /// Set by the check-in process at the venue
    pub checked_in: bool,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl Guest {
    /// Create a new guest record
    pub fn new(id: String, row: &GuestRow, event_name: &str, run_id: &str) -> Self {
        Self {
            id,
            name: row.name.clone(),
            code: row.code,
            event_name: event_name.to_string(),
            run_id: run_id.to_string(),
            checked_in: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
