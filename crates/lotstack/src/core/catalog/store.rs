//! Record Store Module
//!
//! Defines the trait for catalog record persistence and the in-memory
//! implementation used in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::{CoreError, CoreResult, OwnerId, RecordId};

use super::models::{CatalogChange, CatalogRecord, RecordPatch};

/// Broadcast channel capacity for catalog change notifications
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Record Store Trait
// =============================================================================

/// Trait for catalog record persistence backends.
///
/// Implementations notify subscribers with the owner's refreshed record
/// listing after every mutation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates a fresh placeholder record and returns its ID
    async fn create(&self, owner_id: &str) -> CoreResult<RecordId>;

    /// Fetches a record by ID
    async fn get(&self, record_id: &str) -> CoreResult<CatalogRecord>;

    /// Applies a partial update to a record
    async fn update(&self, record_id: &str, patch: RecordPatch) -> CoreResult<()>;

    /// Deletes a record
    async fn delete(&self, record_id: &str) -> CoreResult<()>;

    /// Lists an owner's records in creation order
    async fn list(&self, owner_id: &str) -> CoreResult<Vec<CatalogRecord>>;

    /// Subscribes to change notifications for one owner
    fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<CatalogChange>;
}

// =============================================================================
// Memory Record Store (for testing)
// =============================================================================

/// In-memory record store for tests.
///
/// Supports failure injection so pipeline error paths can be exercised
/// without a real backend.
pub struct MemoryRecordStore {
    records: Mutex<HashMap<RecordId, CatalogRecord>>,
    subscribers: Mutex<HashMap<OwnerId, broadcast::Sender<CatalogChange>>>,
    fail_next_create: AtomicBool,
    fail_on_update_call: Option<usize>,
    update_calls: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            fail_next_create: AtomicBool::new(false),
            fail_on_update_call: None,
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Fails the n-th update call (1-based), counted across all records
    pub fn with_failure_on_update_call(mut self, call: usize) -> Self {
        self.fail_on_update_call = Some(call);
        self
    }

    /// Makes the next create call fail
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Returns how many update calls were made
    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn snapshot(&self, owner_id: &str) -> Vec<CatalogRecord> {
        let records = self.records.lock().expect("records lock poisoned");
        let mut list: Vec<CatalogRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        list
    }

    fn notify(&self, owner_id: &str) {
        let subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        if let Some(tx) = subscribers.get(owner_id) {
            let _ = tx.send(CatalogChange {
                owner_id: owner_id.to_string(),
                records: self.snapshot(owner_id),
            });
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, owner_id: &str) -> CoreResult<RecordId> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(CoreError::RecordStoreFailed(
                "injected create failure".to_string(),
            ));
        }

        let record = CatalogRecord::new(owner_id);
        let record_id = record.id.clone();
        self.records
            .lock()
            .expect("records lock poisoned")
            .insert(record_id.clone(), record);
        self.notify(owner_id);
        Ok(record_id)
    }

    async fn get(&self, record_id: &str) -> CoreResult<CatalogRecord> {
        self.records
            .lock()
            .expect("records lock poisoned")
            .get(record_id)
            .cloned()
            .ok_or_else(|| CoreError::RecordNotFound(record_id.to_string()))
    }

    async fn update(&self, record_id: &str, patch: RecordPatch) -> CoreResult<()> {
        let call = self.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_update_call == Some(call) {
            return Err(CoreError::RecordStoreFailed(format!(
                "injected update failure on call {call}"
            )));
        }

        let owner_id = {
            let mut records = self.records.lock().expect("records lock poisoned");
            let record = records
                .get_mut(record_id)
                .ok_or_else(|| CoreError::RecordNotFound(record_id.to_string()))?;
            patch.apply(record);
            record.owner_id.clone()
        };
        self.notify(&owner_id);
        Ok(())
    }

    async fn delete(&self, record_id: &str) -> CoreResult<()> {
        let owner_id = {
            let mut records = self.records.lock().expect("records lock poisoned");
            let record = records
                .remove(record_id)
                .ok_or_else(|| CoreError::RecordNotFound(record_id.to_string()))?;
            record.owner_id
        };
        self.notify(&owner_id);
        Ok(())
    }

    async fn list(&self, owner_id: &str) -> CoreResult<Vec<CatalogRecord>> {
        Ok(self.snapshot(owner_id))
    }

    fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<CatalogChange> {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        subscribers
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::models::RecordStatus;

    #[tokio::test]
    async fn create_get_update_round_trip() {
        let store = MemoryRecordStore::new();

        let record_id = store.create("owner-1").await.unwrap();
        let record = store.get(&record_id).await.unwrap();
        assert_eq!(record.owner_id, "owner-1");
        assert_eq!(record.status, RecordStatus::Undetermined);

        store
            .update(
                &record_id,
                RecordPatch::default()
                    .with_status(RecordStatus::Cataloged)
                    .with_notes("first"),
            )
            .await
            .unwrap();

        let record = store.get(&record_id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Cataloged);
        assert_eq!(record.notes, "first");
    }

    #[tokio::test]
    async fn get_unknown_record_fails() {
        let store = MemoryRecordStore::new();
        let result = store.get("missing").await;
        assert!(matches!(result, Err(CoreError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn update_unknown_record_fails() {
        let store = MemoryRecordStore::new();
        let result = store.update("missing", RecordPatch::default()).await;
        assert!(matches!(result, Err(CoreError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner() {
        let store = MemoryRecordStore::new();
        store.create("owner-a").await.unwrap();
        store.create("owner-a").await.unwrap();
        store.create("owner-b").await.unwrap();

        assert_eq!(store.list("owner-a").await.unwrap().len(), 2);
        assert_eq!(store.list("owner-b").await.unwrap().len(), 1);
        assert!(store.list("owner-c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribers_receive_refreshed_listing() {
        let store = MemoryRecordStore::new();
        let mut rx = store.subscribe("owner-1");

        let record_id = store.create("owner-1").await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.owner_id, "owner-1");
        assert_eq!(change.records.len(), 1);

        store
            .update(
                &record_id,
                RecordPatch::default().with_status(RecordStatus::Failed),
            )
            .await
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.records[0].status, RecordStatus::Failed);
    }

    #[tokio::test]
    async fn mutations_for_other_owners_are_not_broadcast() {
        let store = MemoryRecordStore::new();
        let mut rx = store.subscribe("owner-1");

        store.create("owner-2").await.unwrap();
        store.create("owner-1").await.unwrap();

        // Only the owner-1 create shows up.
        let change = rx.recv().await.unwrap();
        assert_eq!(change.owner_id, "owner-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn injected_failures_surface_as_store_errors() {
        let store = MemoryRecordStore::new().with_failure_on_update_call(1);

        store.fail_next_create();
        let result = store.create("owner-1").await;
        assert!(matches!(result, Err(CoreError::RecordStoreFailed(_))));

        // Flag resets after firing once.
        let record_id = store.create("owner-1").await.unwrap();
        let result = store.update(&record_id, RecordPatch::default()).await;
        assert!(matches!(result, Err(CoreError::RecordStoreFailed(_))));

        // Later update calls pass.
        store
            .update(&record_id, RecordPatch::default())
            .await
            .unwrap();
        assert_eq!(store.update_call_count(), 2);
    }
}
