//! In-memory record store for development and testing
//!
//! Holds everything behind one lock, so a batch write is all-or-nothing
//! just like the Redis transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use invitation_common::{BatchRecord, Guest, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::storage::GuestStore;

#[derive(Default)]
struct MemoryState {
    guests: HashMap<String, Guest>,
    batch_guests: HashMap<String, HashSet<String>>,
    batches: HashMap<String, BatchRecord>,
}

/// Store that lives for the lifetime of the process
#[derive(Default)]
pub struct MemoryGuestStore {
    state: Mutex<MemoryState>,
}

impl MemoryGuestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total guests held, across all batches
    pub async fn guest_count(&self) -> usize {
        self.state.lock().await.guests.len()
    }
}

#[async_trait]
impl GuestStore for MemoryGuestStore {
    async fn create_guests(&self, run_id: &str, guests: &[Guest]) -> Result<()> {
        let mut state = self.state.lock().await;

        let ids = state.batch_guests.entry(run_id.to_string()).or_default();
        for guest in guests {
            ids.insert(guest.id.clone());
        }
        for guest in guests {
            state.guests.insert(guest.id.clone(), guest.clone());
        }

        debug!("Stored {} guests for batch: {}", guests.len(), run_id);
        Ok(())
    }

    async fn delete_batch_guests(&self, run_id: &str) -> Result<usize> {
        let mut state = self.state.lock().await;

        let ids = state.batch_guests.remove(run_id).unwrap_or_default();
        for id in &ids {
            state.guests.remove(id);
        }
        Ok(ids.len())
    }

    async fn get_guest(&self, guest_id: &str) -> Result<Option<Guest>> {
        Ok(self.state.lock().await.guests.get(guest_id).cloned())
    }

    async fn list_batch_guests(&self, run_id: &str) -> Result<Vec<Guest>> {
        let state = self.state.lock().await;

        Ok(state
            .batch_guests
            .get(run_id)
            .map(|ids| ids.iter().filter_map(|id| state.guests.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn save_batch(&self, batch: &BatchRecord) -> Result<()> {
        self.state
            .lock()
            .await
            .batches
            .insert(batch.run_id.clone(), batch.clone());
        Ok(())
    }

    async fn get_batch(&self, run_id: &str) -> Result<Option<BatchRecord>> {
        Ok(self.state.lock().await.batches.get(run_id).cloned())
    }

    async fn list_batches(&self) -> Result<Vec<BatchRecord>> {
        let mut batches: Vec<BatchRecord> =
            self.state.lock().await.batches.values().cloned().collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invitation_common::GuestRow;

    fn guest(id: &str, run_id: &str) -> Guest {
        Guest::new(id.to_string(), &GuestRow::new("Jane Doe", 4821), "Summer Gala", run_id)
    }

    #[tokio::test]
    async fn test_rollback_only_touches_one_batch() {
        let store = MemoryGuestStore::new();
        store
            .create_guests("run-a", &[guest("a-1", "run-a"), guest("a-2", "run-a")])
            .await
            .unwrap();
        store.create_guests("run-b", &[guest("b-1", "run-b")]).await.unwrap();

        let removed = store.delete_batch_guests("run-a").await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.get_guest("a-1").await.unwrap().is_none());
        assert!(store.get_guest("b-1").await.unwrap().is_some());
        assert_eq!(store.guest_count().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_of_unknown_batch_is_noop() {
        let store = MemoryGuestStore::new();
        assert_eq!(store.delete_batch_guests("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batches_newest_first() {
        let store = MemoryGuestStore::new();
        let older = BatchRecord::new("r1".into(), "A".into(), "a.xlsx".into(), "r1".into());
        let mut newer = BatchRecord::new("r2".into(), "B".into(), "b.xlsx".into(), "r2".into());
        newer.created_at = older.created_at + chrono::Duration::seconds(5);

        store.save_batch(&older).await.unwrap();
        store.save_batch(&newer).await.unwrap();

        let listed = store.list_batches().await.unwrap();
        assert_eq!(listed[0].run_id, "r2");
        assert_eq!(listed[1].run_id, "r1");
    }
}
