//! # Transcode Orchestrator
//!
//! Decides, per planned file, whether it is copied or re-encoded, and drives
//! the encode pipeline when it is.
//!
//! ## Decision Rules
//!
//! - Artwork and image files (`.png .jpg .jpeg .gif`) are always copied.
//! - Audio is re-encoded when the target extension differs from the source
//!   extension, or when normalization is on. The destination then takes the
//!   target extension.
//! - With no encoder configured, normalization re-encodes into the source's
//!   own format when one of the supported encoders produces it.
//!
//! ## Pipeline Lifecycle
//!
//! ```text
//! build ─> Playing ─> wait (poll interval, cancellation checked) ─> Paused ─> Ready ─> Null
//!                                                                       └─> move temp → destination
//! ```
//!
//! The temporary output lives in the configured temp directory and is always
//! removed, whatever the outcome.

use bridge_traits::DeviceStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::differ::{PlanItem, PlanItemKind};
use crate::error::TranscodeError;
use crate::pipeline::{EncoderStage, Pipeline, PipelineFactory, PipelineSpec, PipelineState};
use crate::profile::{EncodeProfile, Encoder};
use crate::selection::TrackSource;
use crate::{DeviceSyncError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

const TEARDOWN_SEQUENCE: [PipelineState; 3] = [
    PipelineState::Paused,
    PipelineState::Ready,
    PipelineState::Null,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMethod {
    Copy,
    Transcode(EncoderStage),
}

/// Final destination and how to get the file there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDecision {
    pub destination: PathBuf,
    pub method: TransferMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Copied,
    Transcoded,
    /// Cancellation arrived while encoding; nothing was written
    Cancelled,
}

pub struct TranscodeOrchestrator {
    profile: EncodeProfile,
    factory: Arc<dyn PipelineFactory>,
    storage: Arc<dyn DeviceStorage>,
    temp_dir: PathBuf,
    poll_interval: Duration,
}

impl TranscodeOrchestrator {
    pub fn new(
        profile: EncodeProfile,
        factory: Arc<dyn PipelineFactory>,
        storage: Arc<dyn DeviceStorage>,
        temp_dir: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            profile,
            factory,
            storage,
            temp_dir: temp_dir.into(),
            poll_interval,
        }
    }

    pub fn profile(&self) -> &EncodeProfile {
        &self.profile
    }

    /// Whether the configured encoder can run on this host.
    pub async fn encoder_available(&self) -> bool {
        self.factory.is_encoder_available(self.profile.encoder).await
    }

    pub fn decide(&self, item: &PlanItem) -> TransferDecision {
        let copy = TransferDecision {
            destination: item.destination.clone(),
            method: TransferMethod::Copy,
        };

        let source_ext = extension_of(item.source.path());
        if item.kind == PlanItemKind::Artwork || IMAGE_EXTENSIONS.contains(&source_ext.as_str()) {
            return copy;
        }

        let target = match self.profile.encoder {
            Encoder::None if self.profile.normalize => Encoder::from_extension(&source_ext),
            Encoder::None => None,
            encoder => Some(encoder),
        };
        let Some(target) = target else {
            return copy;
        };
        let Some(target_ext) = target.extension() else {
            return copy;
        };
        let Some(stage) = EncoderStage::for_profile(target, self.profile.bitrate_kbps) else {
            return copy;
        };

        let target_ext = target_ext.trim_start_matches('.');
        if target_ext == source_ext && !self.profile.normalize {
            return copy;
        }

        TransferDecision {
            destination: item.destination.with_extension(target_ext),
            method: TransferMethod::Transcode(stage),
        }
    }

    /// Place `source` at the decided destination, overwriting it.
    #[instrument(skip(self, source, decision, cancel), fields(destination = ?decision.destination))]
    pub async fn transfer(
        &self,
        source: &TrackSource,
        decision: &TransferDecision,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        let destination = &decision.destination;
        if let Some(parent) = destination.parent() {
            self.storage
                .create_dir_all(parent)
                .await
                .map_err(|e| DeviceSyncError::io(parent, e))?;
        }

        match decision.method {
            TransferMethod::Copy => {
                self.storage
                    .copy_file(source.path(), destination)
                    .await
                    .map_err(|e| DeviceSyncError::io(source.path(), e))?;
                Ok(TransferOutcome::Copied)
            }
            TransferMethod::Transcode(stage) => {
                let Some(local) = source.local_path() else {
                    return Err(TranscodeError::SourceNotLocal(
                        source.path().display().to_string(),
                    )
                    .into());
                };
                self.transcode(local, destination, stage, cancel).await
            }
        }
    }

    async fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        stage: EncoderStage,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        let ext = stage.encoder().extension().unwrap_or_default();
        let temp = self
            .temp_dir
            .join(format!("mpc-convert-{}{}", Uuid::new_v4().simple(), ext));
        let spec = PipelineSpec::new(source, &temp, stage, self.profile.normalize);

        let result = self.encode_and_move(&spec, destination, cancel).await;
        self.remove_temp(&temp).await;
        result
    }

    async fn encode_and_move(
        &self,
        spec: &PipelineSpec,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome> {
        let mut pipeline = self.factory.build(spec).await?;
        let completed = self.run_pipeline(pipeline.as_mut(), cancel).await;
        teardown(pipeline.as_mut()).await;

        if !completed? {
            debug!(source = ?spec.source, "Transcode cancelled");
            return Ok(TransferOutcome::Cancelled);
        }

        self.storage
            .move_file(&spec.output, destination)
            .await
            .map_err(|e| DeviceSyncError::io(destination, e))?;
        Ok(TransferOutcome::Transcoded)
    }

    /// `Ok(true)` on completion, `Ok(false)` when cancelled first.
    async fn run_pipeline(
        &self,
        pipeline: &mut dyn Pipeline,
        cancel: &CancellationToken,
    ) -> std::result::Result<bool, TranscodeError> {
        pipeline.set_state(PipelineState::Playing).await?;
        let mut completion = pipeline
            .take_completion()
            .ok_or(TranscodeError::PipelineClosed)?;

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            match tokio::time::timeout(self.poll_interval, &mut completion).await {
                Ok(Ok(Ok(()))) => return Ok(true),
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Err(_)) => return Err(TranscodeError::PipelineClosed),
                Err(_) => continue,
            }
        }
    }

    async fn remove_temp(&self, temp: &Path) {
        match self.storage.delete_file(temp).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(path = ?temp, error = %e, "Failed to remove temporary encode output"),
        }
    }
}

async fn teardown(pipeline: &mut dyn Pipeline) {
    for state in TEARDOWN_SEQUENCE {
        if let Err(e) = pipeline.set_state(state).await {
            warn!(?state, error = %e, "Pipeline state change failed during teardown");
        }
    }
}

/// Lowercased extension without the dot; empty when there is none.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
