//! Device Storage Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DeviceStorage, DirEntry, FileMetadata},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Tokio-based storage implementation
///
/// Provides async file I/O operations using:
/// - `tokio::fs` for async operations
/// - Temp-sibling-then-rename for atomic replacement
/// - Copy-then-delete fallback when a rename crosses filesystems
#[derive(Debug, Clone, Default)]
pub struct TokioDeviceStorage;

impl TokioDeviceStorage {
    /// Create a new storage accessor
    pub fn new() -> Self {
        Self
    }

    /// Convert std::io::Error to BridgeError, keeping NotFound distinguishable
    fn map_io_error(path: &Path) -> impl Fn(std::io::Error) -> BridgeError + '_ {
        move |e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::NotFound(path.to_path_buf())
            } else {
                BridgeError::Io(e)
            }
        }
    }

    fn temp_sibling(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let tmp_name = format!(".{}.{}.tmp", name, Uuid::new_v4().simple());
        match path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        }
    }
}

#[async_trait]
impl DeviceStorage for TokioDeviceStorage {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(Self::map_io_error(path))?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error(path))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_atomic(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        let tmp_path = Self::temp_sibling(path);
        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(data.as_ref()).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = write_result {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = ?tmp_path, error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(BridgeError::Io(e));
        }

        debug!(path = ?path, size = data.len(), "Atomically wrote file");
        Ok(())
    }

    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        let bytes = fs::copy(src, dst).await.map_err(Self::map_io_error(src))?;
        debug!(src = ?src, dst = ?dst, size = bytes, "Copied file");
        Ok(())
    }

    async fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        match fs::rename(src, dst).await {
            Ok(()) => {
                debug!(src = ?src, dst = ?dst, "Renamed file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BridgeError::NotFound(src.to_path_buf()))
            }
            Err(e) => {
                // Usually EXDEV: temp dir and device live on different filesystems
                debug!(src = ?src, dst = ?dst, error = %e, "Rename failed, copying instead");
                fs::copy(src, dst).await?;
                fs::remove_file(src).await?;
                Ok(())
            }
        }
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(Self::map_io_error(path))?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path)
            .await
            .map_err(Self::map_io_error(path))?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(Self::map_io_error(path))?;

        while let Some(entry) = read_dir.next_entry().await? {
            // file_type() does not follow symlinks; a link is listed as a file
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                entries.push(DirEntry::directory(entry.path()));
            } else {
                entries.push(DirEntry::file(entry.path()));
            }
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}
