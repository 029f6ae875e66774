//! # Device Path Mapping
//!
//! Maps album and track identity to on-device directories and filenames.
//!
//! Directory names must be stable across runs and hosts or every session
//! would look like a full resync, so the mapping depends only on the album
//! name, the sorted artist names and the compilation flag.

use std::path::{Path, PathBuf};

use crate::selection::{AlbumRef, TrackRef};

/// Default bound on directory names, in characters.
pub const DEFAULT_MAX_DIR_NAME_LEN: usize = 100;

const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are unsafe on common device filesystems with `_`.
///
/// Trailing dots and spaces are trimmed (FAT and MTP reject them). The result
/// is never empty.
pub fn sanitize(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_end_matches(&['.', ' '][..]);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased, sanitized, at most `max_len` characters.
pub fn slug(s: &str, max_len: usize) -> String {
    let truncated: String = s.to_lowercase().chars().take(max_len.max(1)).collect();
    sanitize(&truncated)
}

#[derive(Debug, Clone)]
pub struct PathMapper {
    max_dir_name_len: usize,
    reserved_names: Vec<String>,
}

impl PathMapper {
    /// `reserved_names` are root-level names a directory must never take
    /// (the manual directory and the ledger file).
    pub fn new(max_dir_name_len: usize, reserved_names: Vec<String>) -> Self {
        Self {
            max_dir_name_len,
            reserved_names: reserved_names
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }

    /// Directory name for an album, relative to the device root.
    pub fn album_directory(&self, album: &AlbumRef) -> String {
        let name = if album.is_compilation {
            slug(&album.name, self.max_dir_name_len)
        } else {
            let mut artists = album.artists.clone();
            artists.sort();
            slug(
                &format!("{}_{}", artists.join(", "), album.name),
                self.max_dir_name_len,
            )
        };

        if self.reserved_names.contains(&name) {
            format!("{}_", name)
        } else {
            name
        }
    }

    pub fn track_destination(&self, root: &Path, track: &TrackRef) -> PathBuf {
        let file_name = track
            .source
            .file_name()
            .unwrap_or_else(|| track.id.clone());
        root.join(self.album_directory(&track.album))
            .join(sanitize(&file_name))
    }

    pub fn artwork_destination(&self, root: &Path, album: &AlbumRef, artwork: &Path) -> PathBuf {
        let file_name = artwork
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cover.jpg".to_string());
        root.join(self.album_directory(album))
            .join(sanitize(&file_name))
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_DIR_NAME_LEN,
            vec![
                crate::differ::DEFAULT_RESERVED_DIR_NAME.to_string(),
                crate::ledger::DEFAULT_LEDGER_FILE_NAME.to_string(),
            ],
        )
    }
}
