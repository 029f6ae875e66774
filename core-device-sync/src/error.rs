use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceSyncError {
    #[error("Device sync already in progress for device {device_id}")]
    SyncInProgress { device_id: String },

    #[error("No active sync for device {device_id}")]
    NotSyncing { device_id: String },

    #[error("Sync root {path:?} is unavailable: {message}")]
    RootUnavailable { path: PathBuf, message: String },

    #[error("I/O error on {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Device sync cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Selection error: {0}")]
    Selection(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl DeviceSyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error ends the whole session rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootUnavailable { .. })
    }
}

/// Failures of a single re-encode.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Source {0} is not on a local filesystem")]
    SourceNotLocal(String),

    #[error("Failed to build pipeline: {0}")]
    PipelineBuild(String),

    #[error("Encoder exited with {code:?}: {stderr}")]
    EncoderExited { code: Option<i32>, stderr: String },

    #[error("Pipeline closed without reporting completion")]
    PipelineClosed,

    #[error("Pipeline aborted")]
    Aborted,

    #[error("Transcode I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, DeviceSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_root_errors_are_fatal() {
        let root = DeviceSyncError::RootUnavailable {
            path: PathBuf::from("/media/walkman"),
            message: "unmounted".to_string(),
        };
        assert!(root.is_fatal());
        assert!(!DeviceSyncError::io("/media/walkman/a.mp3", "denied").is_fatal());
        assert!(!DeviceSyncError::from(TranscodeError::Aborted).is_fatal());
    }

    #[test]
    fn test_transcode_error_message() {
        let err = DeviceSyncError::from(TranscodeError::SourceNotLocal(
            "https://cdn.example/track.flac".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Transcode failed: Source https://cdn.example/track.flac is not on a local filesystem"
        );
    }
}
