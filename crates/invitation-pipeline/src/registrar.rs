//! Guest registration

use std::sync::Arc;

use invitation_common::{Guest, GuestRow, Result};
use tracing::info;
use uuid::Uuid;

use crate::storage::GuestStore;

/// Creates guest records for a batch in a single atomic write
#[derive(Clone)]
pub struct GuestRegistrar {
    store: Arc<dyn GuestStore>,
}

impl GuestRegistrar {
    pub fn new(store: Arc<dyn GuestStore>) -> Self {
        Self { store }
    }

    /// Register one guest per row, in row order
    pub async fn register(
        &self,
        run_id: &str,
        rows: &[GuestRow],
        event_name: &str,
    ) -> Result<Vec<Guest>> {
        let guests: Vec<Guest> = rows
            .iter()
            .map(|row| Guest::new(Uuid::new_v4().to_string(), row, event_name, run_id))
            .collect();

        self.store.create_guests(run_id, &guests).await?;

        info!(
            "Registered {} guests for event '{}' (batch {})",
            guests.len(),
            event_name,
            run_id
        );
        Ok(guests)
    }

    /// Undo [`register`](Self::register) for a failed batch
    pub async fn rollback(&self, run_id: &str) -> Result<usize> {
        let removed = self.store.delete_batch_guests(run_id).await?;
        if removed > 0 {
            info!("Rolled back {} guests of batch {}", removed, run_id);
        }
        Ok(removed)
    }
}
