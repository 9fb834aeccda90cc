//! Binary storage for uploaded images.
//!
//! Stores return an opaque reference (a public URL path for the disk store) that is
//! persisted on quiz items as-is.

use std::{
    io,
    path::{Path, PathBuf},
};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

/// Extensions accepted for stored images; anything else is saved without one.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "bmp"];

/// Persistence for uploaded binary files.
pub trait FileStore: Send + Sync {
    /// Persist `bytes` and return the reference under which it can be fetched.
    fn store(&self, original_name: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<String>>;
    /// Remove a previously stored file. Unknown references are ignored.
    fn remove(&self, reference: String) -> BoxFuture<'static, StorageResult<()>>;
}

#[derive(Debug, Error)]
enum DiskStoreError {
    #[error("failed to write upload `{path}`")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove upload `{path}`")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// [`FileStore`] writing into a local directory served under `public_prefix`.
#[derive(Clone, Debug)]
pub struct DiskFileStore {
    root: PathBuf,
    public_prefix: String,
}

impl DiskFileStore {
    /// Create a store writing into `root`; references look like `/uploads/<file>`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_prefix(root, "/uploads")
    }

    fn with_prefix(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_owned(),
        }
    }

    fn file_name_for(original_name: &str) -> String {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

        match extension {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        }
    }

    /// Map a reference back to a path inside `root`, refusing anything that escapes it.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = reference
            .strip_prefix(&self.public_prefix)?
            .trim_start_matches('/');
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !name.starts_with('.');
        valid.then(|| self.root.join(name))
    }
}

impl FileStore for DiskFileStore {
    fn store(&self, original_name: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move {
            let file_name = Self::file_name_for(&original_name);
            let path = store.root.join(&file_name);
            let written = match tokio::fs::create_dir_all(&store.root).await {
                Ok(()) => tokio::fs::write(&path, &bytes).await,
                Err(err) => Err(err),
            };
            written.map_err(|source| {
                let err = DiskStoreError::Write {
                    path: path.display().to_string(),
                    source,
                };
                StorageError::failed(err.to_string(), err)
            })?;

            debug!(file = %file_name, size = bytes.len(), "stored upload");
            Ok(format!("{}/{file_name}", store.public_prefix))
        })
    }

    fn remove(&self, reference: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(path) = store.resolve(&reference) else {
                return Ok(());
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => {
                    let err = DiskStoreError::Remove {
                        path: path.display().to_string(),
                        source,
                    };
                    Err(StorageError::failed(err.to_string(), err))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("aniguess-uploads-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn stores_and_removes_files() {
        let root = temp_root();
        let store = DiskFileStore::new(&root);

        let reference = store
            .store("Naruto Cover.PNG".into(), b"png-bytes".to_vec())
            .await
            .unwrap();
        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with(".png"));

        let path = store.resolve(&reference).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        store.remove(reference.clone()).await.unwrap();
        assert!(!path.exists());
        store.remove(reference).await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn unknown_extensions_are_dropped() {
        assert!(!DiskFileStore::file_name_for("payload.html").contains('.'));
        assert!(DiskFileStore::file_name_for("cover.webp").ends_with(".webp"));
    }

    #[test]
    fn references_cannot_escape_the_root() {
        let store = DiskFileStore::new("/srv/uploads");
        assert!(store.resolve("/uploads/../etc/passwd").is_none());
        assert!(store.resolve("/elsewhere/file.png").is_none());
        assert_eq!(
            store.resolve("/uploads/abc.png"),
            Some(PathBuf::from("/srv/uploads/abc.png"))
        );
    }
}
