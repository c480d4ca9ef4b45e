//! Record store for guests and batch runs
//!
//! Redis data model:
//! - guest:{id} → JSON guest record
//! - guests:event:{event_name} → Set of guest ids
//! - guests:batch:{run_id} → Set of guest ids created by one run
//! - batch:{run_id} → JSON batch record
//! - batches:all → Set of run ids

use async_trait::async_trait;
use invitation_common::{BatchRecord, Error, Guest, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

/// Persistence for guests and batch records
#[async_trait]
pub trait GuestStore: Send + Sync {
    /// Write every guest of a run, or none of them
    async fn create_guests(&self, run_id: &str, guests: &[Guest]) -> Result<()>;

    /// Remove every guest created by `run_id`. Returns how many were removed.
    async fn delete_batch_guests(&self, run_id: &str) -> Result<usize>;

    async fn get_guest(&self, guest_id: &str) -> Result<Option<Guest>>;

    /// Guests of a run in no particular order
    async fn list_batch_guests(&self, run_id: &str) -> Result<Vec<Guest>>;

    /// Create or replace a batch record
    async fn save_batch(&self, batch: &BatchRecord) -> Result<()>;

    async fn get_batch(&self, run_id: &str) -> Result<Option<BatchRecord>>;

    /// All batch records, newest first
    async fn list_batches(&self) -> Result<Vec<BatchRecord>>;
}

fn guest_key(guest_id: &str) -> String {
    format!("guest:{}", guest_id)
}

fn event_key(event_name: &str) -> String {
    format!("guests:event:{}", event_name)
}

fn batch_guests_key(run_id: &str) -> String {
    format!("guests:batch:{}", run_id)
}

fn batch_key(run_id: &str) -> String {
    format!("batch:{}", run_id)
}

const BATCHES_INDEX: &str = "batches:all";

fn persistence(err: redis::RedisError) -> Error {
    Error::Persistence(err.to_string())
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisGuestStore {
    conn: ConnectionManager,
}

impl RedisGuestStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Persistence(format!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Persistence(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }
}

#[async_trait]
impl GuestStore for RedisGuestStore {
    async fn create_guests(&self, run_id: &str, guests: &[Guest]) -> Result<()> {
        if guests.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();

        // MULTI/EXEC so a partial batch is never visible
        let mut pipe = redis::pipe();
        pipe.atomic();
        for guest in guests {
            let json = serde_json::to_string(guest)?;
            pipe.set(guest_key(&guest.id), json)
                .ignore()
                .sadd(event_key(&guest.event_name), &guest.id)
                .ignore()
                .sadd(batch_guests_key(run_id), &guest.id)
                .ignore();
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(persistence)?;

        info!("Registered {} guests for batch: {}", guests.len(), run_id);
        Ok(())
    }

    async fn delete_batch_guests(&self, run_id: &str) -> Result<usize> {
        let guests = self.list_batch_guests(run_id).await?;
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for guest in &guests {
            pipe.del(guest_key(&guest.id))
                .ignore()
                .srem(event_key(&guest.event_name), &guest.id)
                .ignore();
        }
        pipe.del(batch_guests_key(run_id)).ignore();

        let _: () = pipe.query_async(&mut conn).await.map_err(persistence)?;

        info!("Removed {} guests of batch: {}", guests.len(), run_id);
        Ok(guests.len())
    }

    async fn get_guest(&self, guest_id: &str) -> Result<Option<Guest>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(guest_key(guest_id)).await.map_err(persistence)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn list_batch_guests(&self, run_id: &str) -> Result<Vec<Guest>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(batch_guests_key(run_id))
            .await
            .map_err(persistence)?;

        let mut guests = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(guest) = self.get_guest(&id).await? {
                guests.push(guest);
            }
        }
        Ok(guests)
    }

    async fn save_batch(&self, batch: &BatchRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(batch)?;

        let _: () = redis::pipe()
            .atomic()
            .set(batch_key(&batch.run_id), json)
            .ignore()
            .sadd(BATCHES_INDEX, &batch.run_id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(persistence)?;

        debug!("Saved batch: {} status: {:?}", batch.run_id, batch.status);
        Ok(())
    }

    async fn get_batch(&self, run_id: &str) -> Result<Option<BatchRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(batch_key(run_id)).await.map_err(persistence)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn list_batches(&self) -> Result<Vec<BatchRecord>> {
        let mut conn = self.conn.clone();
        let run_ids: Vec<String> = conn.smembers(BATCHES_INDEX).await.map_err(persistence)?;

        let mut batches = Vec::new();
        for run_id in run_ids {
            if let Some(batch) = self.get_batch(&run_id).await? {
                batches.push(batch);
            }
        }

        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invitation_common::{BatchStatus, GuestRow};

    async fn get_test_storage() -> RedisGuestStore {
        RedisGuestStore::new("redis://127.0.0.1:6379/15")
            .await
            .expect("Failed to connect to test Redis")
    }

    fn guest(id: &str, run_id: &str) -> Guest {
        Guest::new(
            id.to_string(),
            &GuestRow::new("Jane Doe", 4821),
            "Summer Gala",
            run_id,
        )
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_create_get_and_rollback_guests() {
        let store = get_test_storage().await;
        let guests = vec![guest("redis-g-1", "redis-run-1"), guest("redis-g-2", "redis-run-1")];

        store.create_guests("redis-run-1", &guests).await.unwrap();

        let fetched = store.get_guest("redis-g-1").await.unwrap().expect("Guest not found");
        assert_eq!(fetched.name, "Jane Doe");
        assert_eq!(store.list_batch_guests("redis-run-1").await.unwrap().len(), 2);

        let removed = store.delete_batch_guests("redis-run-1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_guest("redis-g-1").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_save_and_get_batch() {
        let store = get_test_storage().await;
        let mut batch = BatchRecord::new(
            "redis-run-2".to_string(),
            "Summer Gala".to_string(),
            "/tmp/Summer Gala_redis-run-2.xlsx".to_string(),
            "/tmp/redis-run-2".to_string(),
        );
        store.save_batch(&batch).await.unwrap();

        batch.mark_parsed(3).unwrap();
        store.save_batch(&batch).await.unwrap();

        let fetched = store.get_batch("redis-run-2").await.unwrap().unwrap();
        assert_eq!(fetched.status, BatchStatus::Parsed);
        assert_eq!(fetched.guest_count, 3);
        assert!(store
            .list_batches()
            .await
            .unwrap()
            .iter()
            .any(|b| b.run_id == "redis-run-2"));
    }
}
