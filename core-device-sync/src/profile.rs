//! # Encode Profile
//!
//! The per-device output format: which encoder (if any) is applied during
//! transfer, at what bitrate, and whether ReplayGain normalization runs.
//!
//! The encoder and normalize flag are persisted in the device ledger; the
//! bitrate is supplied by the host for each session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DeviceSyncError, Result};

/// Target codec for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoder {
    /// Copy files as they are
    #[default]
    #[serde(rename = "convert_none")]
    None,
    /// Constant bitrate MP3
    #[serde(rename = "convert_mp3")]
    Mp3,
    /// Ogg Vorbis
    #[serde(rename = "convert_vorbis")]
    Vorbis,
    /// Lossless FLAC
    #[serde(rename = "convert_flac")]
    Flac,
    /// AAC in an MP4 container
    #[serde(rename = "convert_aac")]
    Aac,
}

impl Encoder {
    pub const ALL: [Encoder; 5] = [
        Encoder::None,
        Encoder::Mp3,
        Encoder::Vorbis,
        Encoder::Flac,
        Encoder::Aac,
    ];

    /// Key stored in the ledger's `encoder` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoder::None => "convert_none",
            Encoder::Mp3 => "convert_mp3",
            Encoder::Vorbis => "convert_vorbis",
            Encoder::Flac => "convert_flac",
            Encoder::Aac => "convert_aac",
        }
    }

    /// File extension produced by this encoder, including the leading dot.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Encoder::None => None,
            Encoder::Mp3 => Some(".mp3"),
            Encoder::Vorbis => Some(".ogg"),
            Encoder::Flac => Some(".flac"),
            Encoder::Aac => Some(".m4a"),
        }
    }

    /// Encoder producing files with `ext` (with or without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Encoder> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Encoder::ALL.into_iter().find(|encoder| {
            encoder
                .extension()
                .map(|own| own.trim_start_matches('.') == ext)
                .unwrap_or(false)
        })
    }

    /// Whether the encoder takes a bitrate setting
    pub fn uses_bitrate(&self) -> bool {
        matches!(self, Encoder::Mp3 | Encoder::Vorbis | Encoder::Aac)
    }
}

impl FromStr for Encoder {
    type Err = DeviceSyncError;

    fn from_str(s: &str) -> Result<Self> {
        Encoder::ALL
            .into_iter()
            .find(|encoder| encoder.as_str() == s)
            .ok_or_else(|| DeviceSyncError::Config(format!("Unknown encoder: {}", s)))
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default session bitrate, kbps.
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Output format applied to one device for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeProfile {
    pub encoder: Encoder,
    pub bitrate_kbps: u32,
    pub normalize: bool,
}

impl EncodeProfile {
    pub fn new(encoder: Encoder, bitrate_kbps: u32, normalize: bool) -> Self {
        Self {
            encoder,
            bitrate_kbps,
            normalize,
        }
    }

    /// Plain copy, no normalization
    pub fn passthrough() -> Self {
        Self::new(Encoder::None, DEFAULT_BITRATE_KBPS, false)
    }

    /// True when files may be rewritten rather than copied.
    pub fn transforms_audio(&self) -> bool {
        self.encoder != Encoder::None || self.normalize
    }
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::passthrough()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_keys_round_trip() {
        for encoder in Encoder::ALL {
            assert_eq!(encoder.as_str().parse::<Encoder>().unwrap(), encoder);
        }
        assert!("convert_ogg".parse::<Encoder>().is_err());
    }

    #[test]
    fn test_encoder_serde_uses_ledger_keys() {
        let json = serde_json::to_string(&Encoder::Vorbis).unwrap();
        assert_eq!(json, "\"convert_vorbis\"");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Encoder::None.extension(), None);
        assert_eq!(Encoder::Mp3.extension(), Some(".mp3"));
        assert_eq!(Encoder::Vorbis.extension(), Some(".ogg"));
        assert_eq!(Encoder::Flac.extension(), Some(".flac"));
        assert_eq!(Encoder::Aac.extension(), Some(".m4a"));

        assert_eq!(Encoder::from_extension("OGG"), Some(Encoder::Vorbis));
        assert_eq!(Encoder::from_extension(".m4a"), Some(Encoder::Aac));
        assert_eq!(Encoder::from_extension("wav"), None);
    }

    #[test]
    fn test_transforms_audio() {
        assert!(!EncodeProfile::passthrough().transforms_audio());
        assert!(EncodeProfile::new(Encoder::None, 0, true).transforms_audio());
        assert!(EncodeProfile::new(Encoder::Flac, 0, false).transforms_audio());
        assert!(!Encoder::Flac.uses_bitrate());
    }
}
