//! Artifact storage for rendered card files.
//!
//! [`ArtifactStore`] abstracts the byte store artifacts land in;
//! [`FsArtifactStore`] is the filesystem implementation. Writes publish
//! atomically (temp file + rename) so a crashed or cancelled render never
//! leaves a partially written artifact at a published path.

use crate::store::BoxFuture;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during artifact storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// No file exists at the given path
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path steps outside the artifact root
    #[error("path escapes artifact root: {}", .0.display())]
    OutsideRoot(PathBuf),

    /// Underlying filesystem failure
    #[error("artifact I/O error: {0}")]
    Io(String),
}

/// Byte storage for rendered artifacts
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` at `relative` under the store's root and return the
    /// published path. Publication is atomic: readers never observe a
    /// partial file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the path is invalid or the write fails.
    fn write(&self, relative: &Path, bytes: &[u8]) -> BoxFuture<'_, Result<PathBuf, StorageError>>;

    /// Delete the artifact at a previously published path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when the file is already gone,
    /// other [`StorageError`] variants on filesystem failure.
    fn delete(&self, path: &Path) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Size in bytes of the artifact at a published path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when the file does not exist.
    fn size_of(&self, path: &Path) -> BoxFuture<'_, Result<u64, StorageError>>;
}

/// Filesystem-backed artifact store rooted at a single directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a relative artifact path against the root, rejecting absolute
    /// paths and parent-directory traversal.
    fn resolve(&self, relative: &Path) -> Result<PathBuf, StorageError> {
        if relative.is_absolute() {
            return Err(StorageError::OutsideRoot(relative.to_path_buf()));
        }
        for component in relative.components() {
            if matches!(component, Component::ParentDir) {
                return Err(StorageError::OutsideRoot(relative.to_path_buf()));
            }
        }
        Ok(self.root.join(relative))
    }

    /// A published path handed back to `delete`/`size_of` must still live
    /// under the root.
    fn check_published(&self, path: &Path) -> Result<PathBuf, StorageError> {
        if path.starts_with(&self.root) {
            Ok(path.to_path_buf())
        } else if path.is_absolute() {
            Err(StorageError::OutsideRoot(path.to_path_buf()))
        } else {
            self.resolve(path)
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write(&self, relative: &Path, bytes: &[u8]) -> BoxFuture<'_, Result<PathBuf, StorageError>> {
        let resolved = self.resolve(relative);
        let bytes = bytes.to_vec();
        Box::pin(async move {
            let path = resolved?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            }
            // Stage next to the final path so the rename stays on one filesystem.
            let staged = staging_path(&path);
            tokio::fs::write(&staged, &bytes)
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
            tokio::fs::rename(&staged, &path)
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(path)
        })
    }

    fn delete(&self, path: &Path) -> BoxFuture<'_, Result<(), StorageError>> {
        let checked = self.check_published(path);
        let original = path.to_path_buf();
        Box::pin(async move {
            let path = checked?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(original))
                }
                Err(e) => Err(StorageError::Io(e.to_string())),
            }
        })
    }

    fn size_of(&self, path: &Path) -> BoxFuture<'_, Result<u64, StorageError>> {
        let checked = self.check_published(path);
        let original = path.to_path_buf();
        Box::pin(async move {
            let path = checked?;
            match tokio::fs::metadata(&path).await {
                Ok(meta) => Ok(meta.len()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(original))
                }
                Err(e) => Err(StorageError::Io(e.to_string())),
            }
        })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(
        || std::ffi::OsString::from("artifact"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;

    #[tokio::test]
    async fn write_publishes_atomically_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());

        let published = store
            .write(Path::new("cards/KRGC000001_1.jpg"), b"card-bytes")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&published).unwrap(), b"card-bytes");
        assert!(!staging_path(&published).exists());
    }

    #[tokio::test]
    async fn write_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());

        let result = store.write(Path::new("../escape.jpg"), b"x").await;
        assert!(matches!(result, Err(StorageError::OutsideRoot(_))));
    }

    #[tokio::test]
    async fn delete_missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());

        let result = store.delete(&dir.path().join("cards/gone.jpg")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_rejects_paths_outside_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("artifacts"));

        let result = store.delete(Path::new("/etc/hosts")).await;
        assert!(matches!(result, Err(StorageError::OutsideRoot(_))));
    }

    #[tokio::test]
    async fn size_of_reports_written_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf());

        let published = store
            .write(Path::new("cards/sized.jpg"), &[0u8; 1024])
            .await
            .unwrap();
        assert_eq!(store.size_of(&published).await.unwrap(), 1024);
    }
}
