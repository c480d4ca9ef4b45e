//! Invitation Pipeline
//!
//! Turns an uploaded guest list into personalized QR invitations.
//!
//! ## Components
//!
//! - `spreadsheet`: guest list parsing and re-saving
//! - `registrar`: atomic guest registration
//! - `encoder`: QR encoding of guest payloads
//! - `compositor` / `text`: drawing the barcode and name onto the template
//! - `storage` / `memory_store`: guest and batch records
//! - `file_store`: working directories
//! - `orchestrator`: the batch state machine tying it all together
//!
//! ## Data Flow
//!
//! 1. Host uploads a spreadsheet with `name` and `code` columns
//! 2. Rows are parsed and one guest record per row is written
//! 3. The spreadsheet is re-saved with `event_name` and `id` columns
//! 4. Each guest gets `<run_id>/<code>-<name>_<id>.png`

pub mod compositor;
pub mod encoder;
pub mod file_store;
pub mod memory_store;
pub mod orchestrator;
pub mod registrar;
pub mod spreadsheet;
pub mod storage;
pub mod text;

// Re-export commonly used types
pub use compositor::{Compositor, Layout};
pub use encoder::CodeEncoder;
pub use file_store::FileStore;
pub use memory_store::MemoryGuestStore;
pub use orchestrator::{BatchOutcome, InvitationPipeline, PipelineSettings};
pub use registrar::GuestRegistrar;
pub use storage::{GuestStore, RedisGuestStore};
pub use text::{FontRenderer, TextRenderer};
