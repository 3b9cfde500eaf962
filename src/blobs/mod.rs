//! Attachment storage behind an opaque handle
//!
//! Workflows upload files into a named folder and keep only the returned
//! [`BlobHandle`]. Deletes are best-effort from the caller's point of view;
//! failed deletes are queued and retried by [`BlobReconciler`].
mod reconcile;

pub use reconcile::{BlobReconciler, ReconcileReport};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::BlobHandle;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("upload of '{file_name}' failed: {reason}")]
    Upload { file_name: String, reason: String },

    #[error("delete of '{handle}' failed: {reason}")]
    Delete { handle: String, reason: String },

    #[error("invalid blob handle '{0}'")]
    InvalidHandle(String),
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `folder` and return the handle to retrieve it by
    async fn upload(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> Result<BlobHandle, ObjectStoreError>;

    async fn delete(&self, handle: &BlobHandle) -> Result<(), ObjectStoreError>;
}

/// Object store rooted at a local directory
///
/// Handles look like `folder/<uuid>-<file name>` and are always relative to
/// the root.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, handle: &BlobHandle) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(handle.as_str());
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if handle.as_str().is_empty() || escapes {
            return Err(ObjectStoreError::InvalidHandle(handle.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> Result<BlobHandle, ObjectStoreError> {
        let upload_err = |reason: String| ObjectStoreError::Upload {
            file_name: file_name.to_string(),
            reason,
        };

        let folder = sanitize_file_name(folder);
        let dir = self.root.join(&folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        tokio::fs::write(dir.join(&stored_name), &bytes)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let handle = BlobHandle(format!("{folder}/{stored_name}"));
        debug!(handle = %handle, size = bytes.len(), "Stored blob");
        Ok(handle)
    }

    async fn delete(&self, handle: &BlobHandle) -> Result<(), ObjectStoreError> {
        let path = self.resolve(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone counts as deleted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Delete {
                handle: handle.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let handle = store
            .upload("justificaciones", "oficio final.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        assert!(handle.as_str().starts_with("justificaciones/"));
        assert!(handle.as_str().ends_with("oficio_final.pdf"));

        let path = dir.path().join(handle.as_str());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        store.delete(&handle).await.unwrap();
        assert!(!path.exists());
        // Second delete is a no-op
        store.delete(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_handles_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let result = store.delete(&BlobHandle("../outside.pdf".to_string())).await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidHandle(_))));
    }
}
