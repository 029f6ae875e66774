//! # Sync Metadata Ledger
//!
//! Out-of-band record of what has already been placed on a device.
//!
//! ## Overview
//!
//! Many portable players (MTP devices in particular) cannot report reliable
//! modification times for their files, so the ledger stores one for every
//! file the engine wrote, in a JSON file at the device root:
//!
//! ```text
//! {"version":1,"encoder":"convert_mp3","normalize":false,
//!  "tracks_metadata":[{"uri":"album/01.mp3","metadata":{"time::modified":1700000000}}]}
//! ```
//!
//! Keys are always relative to the device root so the ledger stays valid when
//! the device is mounted elsewhere. Entries are kept in a `BTreeMap`, which
//! makes the serialized form deterministic.
//!
//! Loading never fails: a missing, unreadable or unknown-version file yields an
//! empty ledger and therefore a full resync.

use bridge_traits::DeviceStorage;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::profile::{EncodeProfile, Encoder};
use crate::{DeviceSyncError, Result};

/// Only version understood for the entry list.
pub const LEDGER_VERSION: u64 = 1;

/// File name of the ledger under the device root.
pub const DEFAULT_LEDGER_FILE_NAME: &str = "mpc-sync.db";

// ============================================================================
// On-disk Shapes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u64,
    encoder: Encoder,
    normalize: bool,
    tracks_metadata: Vec<LedgerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    uri: String,
    metadata: RecordMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordMetadata {
    #[serde(rename = "time::modified", default)]
    modified: i64,
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMetadataLedger {
    root: PathBuf,
    path: PathBuf,
    encoder: Encoder,
    normalize: bool,
    entries: BTreeMap<String, i64>,
}

impl SyncMetadataLedger {
    /// Empty ledger for `root`, stored as `<root>/<file_name>`.
    pub fn empty(root: impl Into<PathBuf>, file_name: &str) -> Self {
        let root = root.into();
        let path = root.join(file_name);
        Self {
            root,
            path,
            encoder: Encoder::None,
            normalize: false,
            entries: BTreeMap::new(),
        }
    }

    /// Load `<root>/mpc-sync.db`.
    pub async fn load(storage: &dyn DeviceStorage, root: &Path) -> Self {
        Self::load_named(storage, root, DEFAULT_LEDGER_FILE_NAME).await
    }

    /// Load the ledger stored under `file_name`, degrading to empty on any failure.
    pub async fn load_named(storage: &dyn DeviceStorage, root: &Path, file_name: &str) -> Self {
        let ledger = Self::empty(root, file_name);

        match storage.read_file(&ledger.path).await {
            Ok(bytes) => ledger.with_contents(&bytes),
            Err(e) if e.is_not_found() => {
                debug!(path = ?ledger.path, "No ledger on device, starting empty");
                ledger
            }
            Err(e) => {
                warn!(path = ?ledger.path, error = %e, "Failed to read ledger, starting empty");
                ledger
            }
        }
    }

    /// Parse ledger bytes for `root`.
    pub fn from_bytes(root: impl Into<PathBuf>, file_name: &str, bytes: &[u8]) -> Self {
        Self::empty(root, file_name).with_contents(bytes)
    }

    fn with_contents(mut self, bytes: &[u8]) -> Self {
        let document: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ledger is not valid JSON, ignoring it");
                return self;
            }
        };

        // Profile fields are honored whatever the version says
        if let Some(encoder) = document.get("encoder").and_then(Value::as_str) {
            match encoder.parse() {
                Ok(encoder) => self.encoder = encoder,
                Err(_) => warn!(encoder, "Unknown encoder in ledger"),
            }
        }
        if let Some(normalize) = document.get("normalize").and_then(Value::as_bool) {
            self.normalize = normalize;
        }

        if document.get("version").and_then(Value::as_u64) != Some(LEDGER_VERSION) {
            info!(path = ?self.path, "Unknown ledger version, ignoring entries");
            return self;
        }

        let records = document
            .get("tracks_metadata")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        match serde_json::from_value::<Vec<LedgerRecord>>(records) {
            Ok(records) => {
                self.entries = records
                    .into_iter()
                    .map(|record| (record.uri, record.metadata.modified))
                    .collect();
                debug!(path = ?self.path, entries = self.entries.len(), "Loaded ledger");
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Malformed ledger entries, ignoring them");
            }
        }

        self
    }

    /// Serialize with entries sorted by key.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = LedgerFile {
            version: LEDGER_VERSION,
            encoder: self.encoder,
            normalize: self.normalize,
            tracks_metadata: self
                .entries
                .iter()
                .map(|(uri, modified)| LedgerRecord {
                    uri: uri.clone(),
                    metadata: RecordMetadata {
                        modified: *modified,
                    },
                })
                .collect(),
        };

        serde_json::to_vec(&file)
            .map_err(|e| DeviceSyncError::Ledger(format!("Failed to serialize ledger: {}", e)))
    }

    /// Atomically replace the on-device ledger.
    pub async fn save(&self, storage: &dyn DeviceStorage) -> Result<()> {
        let bytes = self.to_bytes()?;
        storage.write_atomic(&self.path, Bytes::from(bytes)).await?;
        debug!(path = ?self.path, entries = self.entries.len(), "Saved ledger");
        Ok(())
    }

    /// Stored mtime for `path`, 0 if unknown.
    pub fn mtime(&self, path: impl AsRef<Path>) -> i64 {
        self.entries
            .get(&self.relative_key(path.as_ref()))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_mtime(&mut self, path: impl AsRef<Path>, modified: i64) {
        let key = self.relative_key(path.as_ref());
        self.entries.insert(key, modified);
    }

    /// Returns whether an entry was present.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let key = self.relative_key(path.as_ref());
        self.entries.remove(&key).is_some()
    }

    pub fn set_profile(&mut self, profile: &EncodeProfile) {
        self.encoder = profile.encoder;
        self.normalize = profile.normalize;
    }

    pub fn encoder(&self) -> Encoder {
        self.encoder
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relative keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `/`-joined key relative to the root; paths outside the root are kept as given.
    fn relative_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
                Component::ParentDir => Some("..".into()),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/media/walkman";

    #[test]
    fn test_absolute_and_relative_paths_share_keys() {
        let mut ledger = SyncMetadataLedger::empty(ROOT, DEFAULT_LEDGER_FILE_NAME);
        ledger.set_mtime("/media/walkman/various/01.mp3", 42);

        assert_eq!(ledger.mtime("various/01.mp3"), 42);
        assert_eq!(ledger.keys().collect::<Vec<_>>(), vec!["various/01.mp3"]);

        assert!(ledger.remove("various/01.mp3"));
        assert_eq!(ledger.mtime("/media/walkman/various/01.mp3"), 0);
        assert!(!ledger.remove("various/01.mp3"));
    }

    #[test]
    fn test_serialization_is_sorted_and_versioned() {
        let mut ledger = SyncMetadataLedger::empty(ROOT, DEFAULT_LEDGER_FILE_NAME);
        ledger.set_profile(&EncodeProfile::new(Encoder::Mp3, 192, true));
        ledger.set_mtime("b/02.mp3", 2);
        ledger.set_mtime("a/01.mp3", 1);

        let json = String::from_utf8(ledger.to_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            "{\"version\":1,\"encoder\":\"convert_mp3\",\"normalize\":true,\"tracks_metadata\":[\
             {\"uri\":\"a/01.mp3\",\"metadata\":{\"time::modified\":1}},\
             {\"uri\":\"b/02.mp3\",\"metadata\":{\"time::modified\":2}}]}"
        );
    }

    #[test]
    fn test_round_trip() {
        let mut ledger = SyncMetadataLedger::empty(ROOT, DEFAULT_LEDGER_FILE_NAME);
        ledger.set_profile(&EncodeProfile::new(Encoder::Vorbis, 160, false));
        ledger.set_mtime("varioushits/01 intro.flac", 1_700_000_000);
        ledger.set_mtime("varioushits/cover.jpg", 1_700_000_100);

        let bytes = ledger.to_bytes().unwrap();
        let loaded = SyncMetadataLedger::from_bytes(ROOT, DEFAULT_LEDGER_FILE_NAME, &bytes);

        assert_eq!(loaded, ledger);
        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_unknown_version_keeps_profile_but_drops_entries() {
        let bytes = br#"{"version":2,"encoder":"convert_flac","normalize":true,
            "tracks_metadata":[{"uri":"a.mp3","metadata":{"time::modified":5}}]}"#;
        let ledger = SyncMetadataLedger::from_bytes(ROOT, DEFAULT_LEDGER_FILE_NAME, bytes);

        assert_eq!(ledger.encoder(), Encoder::Flac);
        assert!(ledger.normalize());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_corrupt_ledger_degrades_to_empty() {
        let ledger =
            SyncMetadataLedger::from_bytes(ROOT, DEFAULT_LEDGER_FILE_NAME, b"{\"version\":1,");
        assert!(ledger.is_empty());
        assert_eq!(ledger.encoder(), Encoder::None);

        let bad_entries = br#"{"version":1,"tracks_metadata":[{"metadata":{}}]}"#;
        let ledger = SyncMetadataLedger::from_bytes(ROOT, DEFAULT_LEDGER_FILE_NAME, bad_entries);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_missing_mtime_reads_as_zero() {
        let bytes = br#"{"version":1,"tracks_metadata":[{"uri":"a.mp3","metadata":{}}]}"#;
        let ledger = SyncMetadataLedger::from_bytes(ROOT, DEFAULT_LEDGER_FILE_NAME, bytes);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.mtime("a.mp3"), 0);
    }

    #[test]
    fn test_ledger_path() {
        let ledger = SyncMetadataLedger::empty(ROOT, DEFAULT_LEDGER_FILE_NAME);
        assert_eq!(ledger.path(), Path::new("/media/walkman/mpc-sync.db"));
    }
}
