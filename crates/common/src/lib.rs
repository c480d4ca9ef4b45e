pub mod batch;
pub mod error;
pub mod guest;

pub use batch::{BatchRecord, BatchStatus};
pub use error::{Error, Result};
pub use guest::{Guest, GuestRow};
