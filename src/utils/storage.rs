// src/utils/storage.rs

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use uuid::Uuid;

/// Public URL prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("unsupported content type '{0}', only images are allowed")]
    UnsupportedType(String),
    #[error("blob storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores uploaded images and hands back the path clients use to fetch them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, body: Bytes, content_type: &str) -> Result<String, BlobError>;

    /// Removing a blob that no longer exists succeeds.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;
}

/// Maps an allowed image content type to the file extension used on disk.
pub fn ext_from_mime(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Size and content-type checks shared by every store.
pub fn check_upload(body: &Bytes, content_type: &str, limit: usize) -> Result<&'static str, BlobError> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| BlobError::UnsupportedType(content_type.to_string()))?;
    if body.len() > limit {
        return Err(BlobError::TooLarge { limit });
    }
    Ok(ext)
}

/// Keeps blobs as files in a local directory, served under [`PUBLIC_PREFIX`].
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Resolves a public path back to a file inside the root.
    /// Anything that does not look like a name this store generated is rejected.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let name = path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !name.starts_with('.');
        valid.then(|| self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, body: Bytes, content_type: &str) -> Result<String, BlobError> {
        let ext = check_upload(&body, content_type, self.max_bytes)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.root.join(&name), &body).await?;

        tracing::debug!("Stored blob {} ({} bytes)", name, body.len());
        Ok(format!("{}/{}", PUBLIC_PREFIX, name))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let Some(file) = self.resolve(path) else {
            tracing::warn!("Refusing to delete blob outside upload dir: {}", path);
            return Ok(());
        };

        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalBlobStore {
        let dir = std::env::temp_dir().join(format!("campus-market-blobs-{}", Uuid::new_v4()));
        LocalBlobStore::new(dir, 16)
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/pdf"), None);
        assert_eq!(ext_from_mime("text/html"), None);
    }

    #[tokio::test]
    async fn store_then_delete_removes_file() {
        let store = temp_store();
        let path = store
            .store(Bytes::from_static(b"\x89PNG...."), "image/png")
            .await
            .unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));

        let file = store.resolve(&path).unwrap();
        assert!(file.exists());

        store.delete(&path).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn missing_blob_delete_is_ok() {
        let store = temp_store();
        store.delete("/uploads/does-not-exist.png").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_oversized_and_non_images() {
        let store = temp_store();

        let err = store
            .store(Bytes::from(vec![0u8; 17]), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::TooLarge { limit: 16 }));

        let err = store
            .store(Bytes::from_static(b"<html>"), "text/html")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::UnsupportedType(_)));
    }

    #[test]
    fn traversal_paths_are_not_resolved() {
        let store = temp_store();
        assert!(store.resolve("/uploads/../secret.db").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("/uploads/").is_none());
    }
}
