//! # Tree Differ
//!
//! Compares what is on the device with what the selection asks for.
//!
//! ## Overview
//!
//! - `enumerate_existing` walks the device breadth-first and lists every
//!   managed file (the reserved manual directory, the ledger and playlist
//!   files are left alone).
//! - `compute_plan` turns the selection into ordered `(source, destination)`
//!   pairs through the `PathMapper`.
//! - `compute_stale` is the set difference of the two.

use bridge_traits::DeviceStorage;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::paths::PathMapper;
use crate::selection::{SyncSelection, TrackSource};
use crate::{DeviceSyncError, Result};

/// Root-level directory the engine never enumerates or deletes.
pub const DEFAULT_RESERVED_DIR_NAME: &str = "unsync";

const PLAYLIST_EXTENSION: &str = "m3u";

// ============================================================================
// Plan Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanItemKind {
    Track,
    Artwork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
    pub source: TrackSource,
    pub destination: PathBuf,
    pub kind: PlanItemKind,
}

/// Ordered transfer list for one session; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub items: Vec<PlanItem>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.iter()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &Path> {
        self.items.iter().map(|item| item.destination.as_path())
    }
}

// ============================================================================
// Differ
// ============================================================================

/// Result of walking the device.
#[derive(Debug, Default)]
pub struct DeviceTree {
    /// Managed files found
    pub files: Vec<PathBuf>,
    /// Directories that could not be listed; their contents are absent from `files`
    pub failures: Vec<DeviceSyncError>,
}

#[derive(Debug, Clone)]
pub struct TreeDiffer {
    mapper: PathMapper,
    reserved_dir_name: String,
    ledger_file_name: String,
}

impl TreeDiffer {
    pub fn new(
        mapper: PathMapper,
        reserved_dir_name: impl Into<String>,
        ledger_file_name: impl Into<String>,
    ) -> Self {
        Self {
            mapper,
            reserved_dir_name: reserved_dir_name.into(),
            ledger_file_name: ledger_file_name.into(),
        }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Every managed file under `root`, in breadth-first order.
    ///
    /// Creates `root` if it does not exist. Failing to create or list the
    /// root is fatal. An unreadable subdirectory is recorded in
    /// `DeviceTree::failures` and skipped, unless the root itself has gone
    /// away in the meantime, which is fatal again.
    pub async fn enumerate_existing(
        &self,
        storage: &dyn DeviceStorage,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DeviceTree> {
        let root_unavailable = |e: &dyn std::fmt::Display| DeviceSyncError::RootUnavailable {
            path: root.to_path_buf(),
            message: e.to_string(),
        };

        if !storage.exists(root).await.map_err(|e| root_unavailable(&e))? {
            storage
                .create_dir_all(root)
                .await
                .map_err(|e| root_unavailable(&e))?;
        }

        let mut tree = DeviceTree::default();
        let mut pending = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = pending.pop_front() {
            if cancel.is_cancelled() {
                return Err(DeviceSyncError::Cancelled);
            }

            let at_root = dir == root;
            let entries = match storage.list_directory(&dir).await {
                Ok(entries) => entries,
                Err(e) if at_root => return Err(root_unavailable(&e)),
                Err(e) => {
                    match storage.exists(root).await {
                        Ok(true) => {}
                        Ok(false) => return Err(root_unavailable(&"device root disappeared")),
                        Err(root_err) => return Err(root_unavailable(&root_err)),
                    }
                    warn!(dir = ?dir, error = %e, "Failed to list device directory, skipping");
                    tree.failures.push(DeviceSyncError::io(&dir, e));
                    continue;
                }
            };

            for entry in entries {
                let name = entry.name();
                if entry.is_directory() {
                    if at_root && name == self.reserved_dir_name {
                        continue;
                    }
                    pending.push_back(entry.path);
                } else {
                    if at_root && name == self.ledger_file_name {
                        continue;
                    }
                    if is_playlist(&entry.path) {
                        continue;
                    }
                    tree.files.push(entry.path);
                }
            }
        }

        debug!(
            root = ?root,
            count = tree.files.len(),
            failures = tree.failures.len(),
            "Enumerated device files"
        );
        Ok(tree)
    }

    /// Tracks in selection order, then one artwork file per album.
    /// Duplicate destinations keep their first occurrence.
    pub fn compute_plan(&self, root: &Path, selection: &SyncSelection) -> SyncPlan {
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(selection.len());

        for track in &selection.tracks {
            let destination = self.mapper.track_destination(root, track);
            if seen.insert(destination.clone()) {
                items.push(PlanItem {
                    source: track.source.clone(),
                    destination,
                    kind: PlanItemKind::Track,
                });
            }
        }

        let mut albums_done = HashSet::new();
        for track in &selection.tracks {
            if !albums_done.insert(track.album.id.as_str()) {
                continue;
            }
            let Some(artwork) = selection.artwork_for(&track.album.id) else {
                continue;
            };
            let destination = self.mapper.artwork_destination(root, &track.album, artwork);
            if seen.insert(destination.clone()) {
                items.push(PlanItem {
                    source: TrackSource::Local(artwork.to_path_buf()),
                    destination,
                    kind: PlanItemKind::Artwork,
                });
            }
        }

        SyncPlan { items }
    }
}

/// Existing files that no planned destination accounts for.
pub fn compute_stale<'a>(
    existing: &[PathBuf],
    planned: impl IntoIterator<Item = &'a Path>,
) -> Vec<PathBuf> {
    let planned: HashSet<&Path> = planned.into_iter().collect();
    existing
        .iter()
        .filter(|path| !planned.contains(path.as_path()))
        .cloned()
        .collect()
}

fn is_playlist(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DEFAULT_LEDGER_FILE_NAME;
    use crate::selection::{AlbumRef, TrackRef};
    use bridge_desktop::TokioDeviceStorage;
    use tempfile::TempDir;

    fn differ() -> TreeDiffer {
        TreeDiffer::new(
            PathMapper::default(),
            DEFAULT_RESERVED_DIR_NAME,
            DEFAULT_LEDGER_FILE_NAME,
        )
    }

    fn various_hits() -> SyncSelection {
        let album = AlbumRef::new("7", "VariousHits").compilation();
        let tracks = ["01 Intro.mp3", "02 Outro.mp3", "01 Intro.mp3"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                TrackRef::new(
                    format!("t{}", i),
                    TrackSource::Local(PathBuf::from("/music/various").join(name)),
                    album.clone(),
                )
            })
            .collect();
        SyncSelection::new(tracks).with_artwork("7", "/cache/art/varioushits.jpg")
    }

    #[test]
    fn test_compute_plan_dedups_and_orders() {
        let plan = differ().compute_plan(Path::new("/dev"), &various_hits());

        let destinations: Vec<_> = plan.destinations().map(Path::to_path_buf).collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("/dev/varioushits/01 Intro.mp3"),
                PathBuf::from("/dev/varioushits/02 Outro.mp3"),
                PathBuf::from("/dev/varioushits/varioushits.jpg"),
            ]
        );
        assert_eq!(plan.items[2].kind, PlanItemKind::Artwork);
    }

    #[test]
    fn test_compute_stale() {
        let existing = vec![PathBuf::from("/dev/a/1.mp3"), PathBuf::from("/dev/b/2.mp3")];
        let planned = [PathBuf::from("/dev/a/1.mp3"), PathBuf::from("/dev/c/3.mp3")];

        let stale = compute_stale(&existing, planned.iter().map(PathBuf::as_path));
        assert_eq!(stale, vec![PathBuf::from("/dev/b/2.mp3")]);
    }

    #[tokio::test]
    async fn test_enumerate_skips_reserved_ledger_and_playlists() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("unsync")).unwrap();
        std::fs::create_dir_all(root.join("album/disc 2")).unwrap();
        std::fs::write(root.join("unsync/mine.mp3"), b"x").unwrap();
        std::fs::write(root.join(DEFAULT_LEDGER_FILE_NAME), b"{}").unwrap();
        std::fs::write(root.join("road trip.m3u"), b"#EXTM3U").unwrap();
        std::fs::write(root.join("album/01.mp3"), b"x").unwrap();
        std::fs::write(root.join("album/disc 2/01.mp3"), b"x").unwrap();

        let tree = differ()
            .enumerate_existing(&TokioDeviceStorage::new(), root, &CancellationToken::new())
            .await
            .unwrap();
        let mut files = tree.files;
        files.sort();

        assert!(tree.failures.is_empty());
        assert_eq!(
            files,
            vec![root.join("album/01.mp3"), root.join("album/disc 2/01.mp3")]
        );
    }

    #[tokio::test]
    async fn test_enumerate_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("Music");

        let tree = differ()
            .enumerate_existing(&TokioDeviceStorage::new(), &root, &CancellationToken::new())
            .await
            .unwrap();

        assert!(tree.files.is_empty());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_enumerate_stops_when_cancelled() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = differ()
            .enumerate_existing(&TokioDeviceStorage::new(), dir.path(), &token)
            .await;

        assert!(matches!(result, Err(DeviceSyncError::Cancelled)));
    }
}
