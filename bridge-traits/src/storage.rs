//! Storage and File System Abstractions
//!
//! Provides the platform-agnostic trait the sync engine uses for every file
//! operation, on the local media library as well as on the sync target.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Modification time in epoch seconds, if the backend reports one.
    ///
    /// Many portable players report garbage or nothing here, which is why the
    /// sync engine keeps its own ledger for target files.
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry returned by [`DeviceStorage::list_directory`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Final path component as UTF-8, lossy.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Device storage access trait
///
/// Abstracts file I/O against media sources and sync targets:
/// - Desktop: Direct filesystem access (local disks, gvfs/MTP FUSE mounts)
/// - Mobile: Sandboxed app directories, SAF/document picker
///
/// Implementations must not follow symlinks when listing, and must treat
/// `copy_file`/`move_file` destinations as overwrite targets.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::DeviceStorage;
///
/// async fn push(storage: &dyn DeviceStorage, src: &Path, dst: &Path) -> Result<()> {
///     if let Some(parent) = dst.parent() {
///         storage.create_dir_all(parent).await?;
///     }
///     storage.copy_file(src, dst).await
/// }
/// ```
#[async_trait]
pub trait DeviceStorage: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace a file's contents atomically
    ///
    /// The data is first written to a temporary sibling and then renamed over
    /// `path`, so readers observe either the old or the new contents, never a
    /// partial write.
    async fn write_atomic(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Copy a file, overwriting the destination
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Move a file, overwriting the destination
    ///
    /// Must work across filesystems (e.g. from a local temp dir to a device).
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete an empty directory
    async fn delete_dir(&self, path: &Path) -> Result<()>;

    /// List the direct children of a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Check whether a directory has no children
    async fn is_dir_empty(&self, path: &Path) -> Result<bool> {
        Ok(self.list_directory(path).await?.is_empty())
    }
}
