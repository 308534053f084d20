//! Local Disk Storage
//!
//! Stores uploaded assets under a root directory, one subdirectory per
//! owner and record. Writes go through a temp file so a crashed upload
//! never leaves a half-written asset at the final path.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::core::fs::validate_path_id_component;
use crate::core::{CoreError, CoreResult};

use super::{AssetRef, StorageAdapter};

/// Storage adapter writing assets to the local filesystem.
///
/// Layout: `{root}/{owner_id}/{record_id}/{index:03}-{asset_id}`
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root directory
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl StorageAdapter for LocalDiskStorage {
    fn name(&self) -> &str {
        "local-disk"
    }

    async fn upload(
        &self,
        bytes: &[u8],
        owner_id: &str,
        record_id: &str,
        index: usize,
    ) -> CoreResult<AssetRef> {
        // Owner and record IDs become directory names; reject traversal attempts.
        validate_path_id_component(owner_id, "ownerId").map_err(CoreError::ValidationError)?;
        validate_path_id_component(record_id, "recordId").map_err(CoreError::ValidationError)?;

        let asset_id = ulid::Ulid::new().to_string();
        let dir = self.root.join(owner_id).join(record_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::UploadFailed(format!("failed to create asset dir: {e}")))?;

        let file_name = format!("{index:03}-{asset_id}");
        let final_path = dir.join(&file_name);
        let tmp_path = dir.join(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| CoreError::UploadFailed(format!("failed to write asset: {e}")))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CoreError::UploadFailed(format!(
                "failed to finalize asset: {e}"
            )));
        }

        debug!(path = %final_path.display(), bytes = bytes.len(), "stored asset");

        Ok(AssetRef {
            id: asset_id,
            record_id: record_id.to_string(),
            index,
            location: final_path.to_string_lossy().to_string(),
            byte_len: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upload_writes_asset_under_owner_and_record() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(dir.path());

        let asset = storage
            .upload(b"jpeg-bytes", "owner-1", "rec-1", 0)
            .await
            .unwrap();

        assert_eq!(asset.record_id, "rec-1");
        assert_eq!(asset.index, 0);
        assert_eq!(asset.byte_len, 10);

        let stored = std::fs::read(&asset.location).unwrap();
        assert_eq!(stored, b"jpeg-bytes");
        assert!(asset.location.contains("owner-1"));
        assert!(asset.location.contains("rec-1"));
    }

    #[tokio::test]
    async fn upload_orders_files_by_index_prefix() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(dir.path());

        storage.upload(b"a", "owner", "rec", 0).await.unwrap();
        storage.upload(b"b", "owner", "rec", 1).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("owner").join("rec"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("000-"));
        assert!(names[1].starts_with("001-"));
    }

    #[tokio::test]
    async fn upload_rejects_traversal_owner_id() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(dir.path());

        let result = storage.upload(b"x", "../evil", "rec", 0).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));

        let result = storage.upload(b"x", "owner", "a/b", 0).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn upload_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(dir.path());

        storage.upload(b"a", "owner", "rec", 0).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("owner").join("rec"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .collect();
        assert!(leftovers.is_empty());
    }
}
