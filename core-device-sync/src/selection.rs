//! # Sync Selection
//!
//! Caller-supplied inputs for a session: the target device, the tracks to
//! mirror and the artwork available for their albums.
//!
//! ## Overview
//!
//! The engine never decides what to sync. A host library resolves which
//! albums and playlists are marked for a device (`SyncedDevices`) and turns
//! them into a `SyncSelection`, either directly or through a
//! `SelectionProvider` implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::Result;

// ============================================================================
// Device Identity
// ============================================================================

/// Opaque identifier of a sync target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A mounted storage location to mirror into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub device_id: DeviceId,
    pub root: PathBuf,
}

impl SyncTarget {
    pub fn new(device_id: impl Into<DeviceId>, root: impl Into<PathBuf>) -> Self {
        Self {
            device_id: device_id.into(),
            root: root.into(),
        }
    }
}

/// Devices an album or playlist is marked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedDevices(BTreeSet<DeviceId>);

impl SyncedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the device was already marked.
    pub fn insert(&mut self, device: DeviceId) -> bool {
        self.0.insert(device)
    }

    pub fn remove(&mut self, device: &DeviceId) -> bool {
        self.0.remove(device)
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.0.contains(device)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceId> {
        self.0.iter()
    }
}

impl FromIterator<DeviceId> for SyncedDevices {
    fn from_iter<I: IntoIterator<Item = DeviceId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Track Identity
// ============================================================================

/// Where the audio for a track lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// A path on a local filesystem; can be decoded by the encoder
    Local(PathBuf),
    /// Reachable through the storage bridge only (network shares, other devices)
    Remote(PathBuf),
}

impl TrackSource {
    pub fn path(&self) -> &Path {
        match self {
            TrackSource::Local(path) | TrackSource::Remote(path) => path,
        }
    }

    /// Local path, if the encoder can read this source directly
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            TrackSource::Local(path) => Some(path),
            TrackSource::Remote(_) => None,
        }
    }

    pub fn file_name(&self) -> Option<String> {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Album identity used for directory naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    /// Various-artists album; the directory is named after the album only
    pub is_compilation: bool,
}

impl AlbumRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: Vec::new(),
            is_compilation: false,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artists.push(artist.into());
        self
    }

    pub fn compilation(mut self) -> Self {
        self.is_compilation = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub id: String,
    pub source: TrackSource,
    pub album: AlbumRef,
}

impl TrackRef {
    pub fn new(id: impl Into<String>, source: TrackSource, album: AlbumRef) -> Self {
        Self {
            id: id.into(),
            source,
            album,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// An album or playlist with the devices it should be mirrored to.
#[derive(Debug, Clone, Default)]
pub struct SyncedCollection {
    pub tracks: Vec<TrackRef>,
    pub devices: SyncedDevices,
}

/// Ordered tracks plus artwork resolved per album id.
#[derive(Debug, Clone, Default)]
pub struct SyncSelection {
    pub tracks: Vec<TrackRef>,
    pub artwork: HashMap<String, PathBuf>,
}

impl SyncSelection {
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self {
            tracks,
            artwork: HashMap::new(),
        }
    }

    pub fn with_artwork(mut self, album_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.artwork.insert(album_id.into(), path.into());
        self
    }

    pub fn artwork_for(&self, album_id: &str) -> Option<&Path> {
        self.artwork.get(album_id).map(PathBuf::as_path)
    }

    /// Gathers the tracks of every album, then every playlist, marked for `device`.
    pub fn from_collections(
        device: &DeviceId,
        albums: &[SyncedCollection],
        playlists: &[SyncedCollection],
        artwork: HashMap<String, PathBuf>,
    ) -> Self {
        let tracks = albums
            .iter()
            .chain(playlists)
            .filter(|collection| collection.devices.contains(device))
            .flat_map(|collection| collection.tracks.iter().cloned())
            .collect();

        Self { tracks, artwork }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Host library lookup of what a device should contain.
#[async_trait]
pub trait SelectionProvider: Send + Sync {
    async fn selection_for(&self, device: &DeviceId) -> Result<SyncSelection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, album: &AlbumRef) -> TrackRef {
        TrackRef::new(
            id,
            TrackSource::Local(PathBuf::from(format!("/music/{}.flac", id))),
            album.clone(),
        )
    }

    #[test]
    fn test_synced_devices_has_no_index_cap() {
        let devices: SyncedDevices = (0..100)
            .map(|i| DeviceId::new(format!("device-{}", i)))
            .collect();

        assert!(devices.contains(&DeviceId::new("device-99")));
        assert!(!devices.contains(&DeviceId::new("device-100")));
    }

    #[test]
    fn test_from_collections_orders_albums_before_playlists() {
        let walkman = DeviceId::new("walkman");
        let phone = DeviceId::new("phone");
        let album = AlbumRef::new("a1", "Blue").with_artist("Joni Mitchell");

        let mut marked = SyncedDevices::new();
        marked.insert(walkman.clone());

        let playlist = SyncedCollection {
            tracks: vec![track("p1", &album)],
            devices: marked.clone(),
        };
        let synced_album = SyncedCollection {
            tracks: vec![track("t1", &album), track("t2", &album)],
            devices: marked,
        };
        let other_album = SyncedCollection {
            tracks: vec![track("x1", &album)],
            devices: [phone].into_iter().collect(),
        };

        let selection = SyncSelection::from_collections(
            &walkman,
            &[synced_album, other_album],
            &[playlist],
            HashMap::new(),
        );

        let ids: Vec<_> = selection.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "p1"]);
    }

    #[test]
    fn test_track_source_locality() {
        let local = TrackSource::Local(PathBuf::from("/music/a.flac"));
        let remote = TrackSource::Remote(PathBuf::from("/run/user/1000/gvfs/smb/a.flac"));

        assert!(local.local_path().is_some());
        assert!(remote.local_path().is_none());
        assert_eq!(remote.file_name().as_deref(), Some("a.flac"));
    }
}
