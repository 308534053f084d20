//! Asset Storage Module
//!
//! Defines the adapter trait for uploading photo assets to backing
//! storage, plus an in-memory implementation for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AssetId, CoreError, CoreResult, RecordId};

pub mod local;

pub use local::LocalDiskStorage;

// =============================================================================
// Asset Reference
// =============================================================================

/// Reference to one uploaded photo asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub id: AssetId,
    pub record_id: RecordId,
    /// Position within the record's photo set (0 = hero)
    pub index: usize,
    /// Adapter-specific location (path, URL, or object key)
    pub location: String,
    pub byte_len: u64,
}

// =============================================================================
// Storage Adapter Trait
// =============================================================================

/// Trait for asset storage backends (local disk, object storage, etc.)
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the adapter name for logging
    fn name(&self) -> &str;

    /// Uploads one photo payload and returns its asset reference.
    ///
    /// `index` is the photo's position within the record (0 = hero) and
    /// must be reflected in the returned reference.
    async fn upload(
        &self,
        bytes: &[u8],
        owner_id: &str,
        record_id: &str,
        index: usize,
    ) -> CoreResult<AssetRef>;
}

// =============================================================================
// Memory Storage (for testing)
// =============================================================================

/// In-memory storage adapter for tests.
///
/// Records every upload and supports failure and latency injection.
pub struct MemoryStorage {
    fail_on_call: Option<usize>,
    fail_on_index: Option<usize>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    uploads: Mutex<Vec<AssetRef>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            fail_on_call: None,
            fail_on_index: None,
            delay: None,
            calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Fails the n-th upload call (1-based), counted across all records
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Fails every upload with the given photo index
    pub fn with_failure_on_index(mut self, index: usize) -> Self {
        self.fail_on_index = Some(index);
        self
    }

    /// Delays every upload, for timeout tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many uploads were attempted
    pub fn upload_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the successful uploads in call order
    pub fn uploads(&self) -> Vec<AssetRef> {
        self.uploads.lock().expect("uploads lock poisoned").clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(
        &self,
        bytes: &[u8],
        owner_id: &str,
        record_id: &str,
        index: usize,
    ) -> CoreResult<AssetRef> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(CoreError::UploadFailed(format!(
                "injected failure on call {call}"
            )));
        }
        if self.fail_on_index == Some(index) {
            return Err(CoreError::UploadFailed(format!(
                "injected failure on index {index}"
            )));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let asset = AssetRef {
            id: ulid::Ulid::new().to_string(),
            record_id: record_id.to_string(),
            index,
            location: format!("mem://{owner_id}/{record_id}/{index}"),
            byte_len: bytes.len() as u64,
        };
        self.uploads
            .lock()
            .expect("uploads lock poisoned")
            .push(asset.clone());
        Ok(asset)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_records_uploads_in_order() {
        let storage = MemoryStorage::new();

        storage.upload(b"aaa", "owner", "rec-1", 0).await.unwrap();
        storage.upload(b"bb", "owner", "rec-1", 1).await.unwrap();

        let uploads = storage.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].index, 0);
        assert_eq!(uploads[0].byte_len, 3);
        assert_eq!(uploads[1].index, 1);
        assert_eq!(uploads[1].location, "mem://owner/rec-1/1");
    }

    #[tokio::test]
    async fn memory_storage_fails_injected_call() {
        let storage = MemoryStorage::new().with_failure_on_call(2);

        assert!(storage.upload(b"a", "o", "r", 0).await.is_ok());
        let result = storage.upload(b"b", "o", "r", 1).await;
        assert!(matches!(result, Err(CoreError::UploadFailed(_))));

        // The failed call still counts; later calls succeed again.
        assert!(storage.upload(b"c", "o", "r", 2).await.is_ok());
        assert_eq!(storage.upload_count(), 3);
        assert_eq!(storage.uploads().len(), 2);
    }
}
