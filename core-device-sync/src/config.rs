//! # Device Sync Configuration
//!
//! Settings for a `DeviceSyncEngine`, assembled with a builder and validated
//! once at `build()`.
//!
//! ## Usage
//!
//! ```rust
//! use core_device_sync::{DeviceSyncConfig, EncodeProfile, Encoder};
//! use std::time::Duration;
//!
//! let config = DeviceSyncConfig::builder()
//!     .profile(EncodeProfile::new(Encoder::Mp3, 192, false))
//!     .transcode_poll_interval(Duration::from_millis(500))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.reserved_dir_name, "unsync");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::differ::DEFAULT_RESERVED_DIR_NAME;
use crate::ledger::DEFAULT_LEDGER_FILE_NAME;
use crate::paths::{PathMapper, DEFAULT_MAX_DIR_NAME_LEN};
use crate::profile::EncodeProfile;
use crate::{DeviceSyncError, Result};

/// Default cadence of the transcode completion wait.
pub const DEFAULT_TRANSCODE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DeviceSyncConfig {
    /// Output format for this device
    pub profile: EncodeProfile,
    /// How often the transcode wait wakes to check for cancellation
    pub transcode_poll_interval: Duration,
    /// Local directory for encoder output before it is moved to the device
    pub temp_dir: PathBuf,
    /// Root-level directory left untouched for user-managed files
    pub reserved_dir_name: String,
    pub ledger_file_name: String,
    /// Bound on album directory names, in characters
    pub max_dir_name_len: usize,
}

impl DeviceSyncConfig {
    pub fn builder() -> DeviceSyncConfigBuilder {
        DeviceSyncConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.transcode_poll_interval.is_zero() {
            return Err(DeviceSyncError::Config(
                "Transcode poll interval must be greater than zero".to_string(),
            ));
        }

        if self.profile.encoder.uses_bitrate() && self.profile.bitrate_kbps == 0 {
            return Err(DeviceSyncError::Config(format!(
                "Encoder {} requires a bitrate",
                self.profile.encoder
            )));
        }

        if self.temp_dir.as_os_str().is_empty() {
            return Err(DeviceSyncError::Config(
                "Temp directory cannot be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("reserved_dir_name", &self.reserved_dir_name),
            ("ledger_file_name", &self.ledger_file_name),
        ] {
            if value.is_empty() || value.contains(&['/', '\\'][..]) {
                return Err(DeviceSyncError::Config(format!(
                    "{} must be a single non-empty path component, got {:?}",
                    field, value
                )));
            }
        }

        if self.reserved_dir_name == self.ledger_file_name {
            return Err(DeviceSyncError::Config(
                "Reserved directory and ledger file must have different names".to_string(),
            ));
        }

        if self.max_dir_name_len == 0 {
            return Err(DeviceSyncError::Config(
                "Maximum directory name length must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Path mapper honoring the configured names and length bound
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(
            self.max_dir_name_len,
            vec![self.reserved_dir_name.clone(), self.ledger_file_name.clone()],
        )
    }
}

impl Default for DeviceSyncConfig {
    fn default() -> Self {
        Self {
            profile: EncodeProfile::default(),
            transcode_poll_interval: DEFAULT_TRANSCODE_POLL_INTERVAL,
            temp_dir: std::env::temp_dir(),
            reserved_dir_name: DEFAULT_RESERVED_DIR_NAME.to_string(),
            ledger_file_name: DEFAULT_LEDGER_FILE_NAME.to_string(),
            max_dir_name_len: DEFAULT_MAX_DIR_NAME_LEN,
        }
    }
}

/// Builder for [`DeviceSyncConfig`]
#[derive(Debug, Default)]
pub struct DeviceSyncConfigBuilder {
    profile: Option<EncodeProfile>,
    transcode_poll_interval: Option<Duration>,
    temp_dir: Option<PathBuf>,
    reserved_dir_name: Option<String>,
    ledger_file_name: Option<String>,
    max_dir_name_len: Option<usize>,
}

impl DeviceSyncConfigBuilder {
    pub fn profile(mut self, profile: EncodeProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn transcode_poll_interval(mut self, interval: Duration) -> Self {
        self.transcode_poll_interval = Some(interval);
        self
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.temp_dir = Some(path.into());
        self
    }

    pub fn reserved_dir_name(mut self, name: impl Into<String>) -> Self {
        self.reserved_dir_name = Some(name.into());
        self
    }

    pub fn ledger_file_name(mut self, name: impl Into<String>) -> Self {
        self.ledger_file_name = Some(name.into());
        self
    }

    pub fn max_dir_name_len(mut self, len: usize) -> Self {
        self.max_dir_name_len = Some(len);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `DeviceSyncError::Config` if any value is out of range.
    pub fn build(self) -> Result<DeviceSyncConfig> {
        let defaults = DeviceSyncConfig::default();
        let config = DeviceSyncConfig {
            profile: self.profile.unwrap_or(defaults.profile),
            transcode_poll_interval: self
                .transcode_poll_interval
                .unwrap_or(defaults.transcode_poll_interval),
            temp_dir: self.temp_dir.unwrap_or(defaults.temp_dir),
            reserved_dir_name: self.reserved_dir_name.unwrap_or(defaults.reserved_dir_name),
            ledger_file_name: self.ledger_file_name.unwrap_or(defaults.ledger_file_name),
            max_dir_name_len: self.max_dir_name_len.unwrap_or(defaults.max_dir_name_len),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Encoder;

    #[test]
    fn test_defaults() {
        let config = DeviceSyncConfig::builder().build().unwrap();
        assert_eq!(config.transcode_poll_interval, Duration::from_secs(1));
        assert_eq!(config.reserved_dir_name, "unsync");
        assert_eq!(config.ledger_file_name, "mpc-sync.db");
        assert_eq!(config.max_dir_name_len, 100);
        assert_eq!(config.profile.encoder, Encoder::None);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = DeviceSyncConfig::builder()
            .transcode_poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(DeviceSyncError::Config(_))));
    }

    #[test]
    fn test_bitrate_required_for_lossy_encoders() {
        let result = DeviceSyncConfig::builder()
            .profile(EncodeProfile::new(Encoder::Aac, 0, false))
            .build();
        assert!(result.is_err());

        let flac = DeviceSyncConfig::builder()
            .profile(EncodeProfile::new(Encoder::Flac, 0, false))
            .build();
        assert!(flac.is_ok());
    }

    #[test]
    fn test_names_must_be_single_components() {
        assert!(DeviceSyncConfig::builder()
            .reserved_dir_name("")
            .build()
            .is_err());
        assert!(DeviceSyncConfig::builder()
            .ledger_file_name("meta/sync.db")
            .build()
            .is_err());
        assert!(DeviceSyncConfig::builder()
            .reserved_dir_name("same")
            .ledger_file_name("same")
            .build()
            .is_err());
    }

    #[test]
    fn test_path_mapper_uses_configured_bound() {
        let config = DeviceSyncConfig::builder()
            .max_dir_name_len(5)
            .build()
            .unwrap();
        let album = crate::selection::AlbumRef::new("1", "Greatest Hits").compilation();
        assert_eq!(config.path_mapper().album_directory(&album), "great");
    }
}
