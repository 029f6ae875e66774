//! # Encode Pipeline
//!
//! Abstraction over the decode → resample → (normalize) → encode chain used
//! to re-encode one file, plus the default `ffmpeg` backend.
//!
//! ## Overview
//!
//! A `PipelineFactory` builds a `Pipeline` from a `PipelineSpec`. The
//! pipeline starts work when set to `Playing` and reports the outcome once on
//! its completion channel. Setting it to `Null` before completion aborts the
//! work. The orchestrator in `transcode` drives this lifecycle.
//!
//! ## Stages
//!
//! ```text
//! decode ─> resample 44.1 kHz / 2 ch ─> [ReplayGain +6 dB, limiter] ─> encode ─> temp file
//! ```

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TranscodeError;
use crate::profile::Encoder;

pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;
pub const OUTPUT_CHANNELS: u32 = 2;

/// Outcome reported once per pipeline run.
pub type Completion = oneshot::Receiver<std::result::Result<(), TranscodeError>>;

// ============================================================================
// Pipeline Description
// ============================================================================

/// Pipeline lifecycle states, in teardown order `Paused → Ready → Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Encoder stage with its bitrate already converted to the unit the codec takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderStage {
    /// Constant bitrate, kbps
    Mp3 { bitrate_kbps: u32 },
    /// Upper bound, bits per second
    Vorbis { max_bitrate_bps: u32 },
    Flac,
    /// Bits per second
    Aac { bitrate_bps: u32 },
}

impl EncoderStage {
    /// `None` for `Encoder::None`, which never builds a pipeline.
    pub fn for_profile(encoder: Encoder, bitrate_kbps: u32) -> Option<Self> {
        match encoder {
            Encoder::None => None,
            Encoder::Mp3 => Some(Self::Mp3 { bitrate_kbps }),
            Encoder::Vorbis => Some(Self::Vorbis {
                max_bitrate_bps: bitrate_kbps.saturating_mul(1000),
            }),
            Encoder::Flac => Some(Self::Flac),
            Encoder::Aac => Some(Self::Aac {
                bitrate_bps: bitrate_kbps.saturating_mul(1000),
            }),
        }
    }

    pub fn encoder(&self) -> Encoder {
        match self {
            Self::Mp3 { .. } => Encoder::Mp3,
            Self::Vorbis { .. } => Encoder::Vorbis,
            Self::Flac => Encoder::Flac,
            Self::Aac { .. } => Encoder::Aac,
        }
    }
}

/// ReplayGain normalization followed by a limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub pre_amp_db: f64,
    pub headroom_db: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            pre_amp_db: 6.0,
            headroom_db: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub source: PathBuf,
    pub output: PathBuf,
    pub sample_rate: u32,
    pub channels: u32,
    pub normalization: Option<Normalization>,
    pub encoder: EncoderStage,
}

impl PipelineSpec {
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        encoder: EncoderStage,
        normalize: bool,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
            normalization: normalize.then(Normalization::default),
            encoder,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// One constructed encode run.
#[async_trait]
pub trait Pipeline: Send {
    async fn set_state(&mut self, state: PipelineState) -> std::result::Result<(), TranscodeError>;

    fn state(&self) -> PipelineState;

    /// Completion channel; yields `Some` once.
    fn take_completion(&mut self) -> Option<Completion>;
}

#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(
        &self,
        spec: &PipelineSpec,
    ) -> std::result::Result<Box<dyn Pipeline>, TranscodeError>;

    /// Whether the backend can produce `encoder` output on this host.
    async fn is_encoder_available(&self, encoder: Encoder) -> bool;
}

// ============================================================================
// ffmpeg Backend
// ============================================================================

/// Runs each pipeline as an `ffmpeg` child process.
#[derive(Debug, Clone)]
pub struct FfmpegPipelineFactory {
    program: PathBuf,
}

impl FfmpegPipelineFactory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// ffmpeg codec name for an encoder
    fn codec_name(encoder: Encoder) -> Option<&'static str> {
        match encoder {
            Encoder::None => None,
            Encoder::Mp3 => Some("libmp3lame"),
            Encoder::Vorbis => Some("libvorbis"),
            Encoder::Flac => Some("flac"),
            Encoder::Aac => Some("aac"),
        }
    }
}

impl Default for FfmpegPipelineFactory {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl PipelineFactory for FfmpegPipelineFactory {
    async fn build(
        &self,
        spec: &PipelineSpec,
    ) -> std::result::Result<Box<dyn Pipeline>, TranscodeError> {
        if spec.source.as_os_str().is_empty() || spec.output.as_os_str().is_empty() {
            return Err(TranscodeError::PipelineBuild(
                "source and output paths are required".to_string(),
            ));
        }

        Ok(Box::new(FfmpegPipeline {
            program: self.program.clone(),
            args: ffmpeg_args(spec),
            state: PipelineState::Null,
            stop: CancellationToken::new(),
            completion: None,
            started: false,
        }))
    }

    async fn is_encoder_available(&self, encoder: Encoder) -> bool {
        let Some(codec) = Self::codec_name(encoder) else {
            return true;
        };

        let output = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(codec)),
            Ok(output) => {
                warn!(status = ?output.status, "ffmpeg -encoders failed");
                false
            }
            Err(e) => {
                warn!(program = ?self.program, error = %e, "ffmpeg not runnable");
                false
            }
        }
    }
}

/// Command line for one spec.
pub fn ffmpeg_args(spec: &PipelineSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-nostdin",
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(spec.source.clone().into_os_string());

    let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));

    push(&["-vn", "-map_metadata", "0"]);
    push(&["-ar", &spec.sample_rate.to_string()]);
    push(&["-ac", &spec.channels.to_string()]);

    if let Some(normalization) = spec.normalization {
        // Gain may exceed full scale by the headroom; the limiter catches it
        let noclip = if normalization.headroom_db > 0.0 { 0 } else { 1 };
        push(&[
            "-af",
            &format!(
                "volume=replaygain=track:replaygain_preamp={:.1}:replaygain_noclip={},alimiter",
                normalization.pre_amp_db, noclip
            ),
        ]);
    }

    match spec.encoder {
        EncoderStage::Mp3 { bitrate_kbps } => {
            push(&["-c:a", "libmp3lame", "-b:a", &format!("{}k", bitrate_kbps)]);
            push(&["-f", "mp3"]);
        }
        EncoderStage::Vorbis { max_bitrate_bps } => {
            let bitrate = max_bitrate_bps.to_string();
            push(&["-c:a", "libvorbis", "-b:a", &bitrate, "-maxrate", &bitrate]);
            push(&["-f", "ogg"]);
        }
        EncoderStage::Flac => push(&["-c:a", "flac", "-f", "flac"]),
        EncoderStage::Aac { bitrate_bps } => {
            push(&["-c:a", "aac", "-b:a", &bitrate_bps.to_string()]);
            push(&["-f", "mp4"]);
        }
    }

    args.push(spec.output.clone().into_os_string());
    args
}

struct FfmpegPipeline {
    program: PathBuf,
    args: Vec<OsString>,
    state: PipelineState,
    stop: CancellationToken,
    completion: Option<Completion>,
    started: bool,
}

impl FfmpegPipeline {
    fn start(&mut self) -> std::result::Result<(), TranscodeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TranscodeError::PipelineBuild(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut buf).await {
                    debug!(error = %e, "Failed to read ffmpeg stderr");
                }
            }
            buf
        });

        let (tx, rx) = oneshot::channel();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            let waited = tokio::select! {
                status = child.wait() => Some(status),
                _ = stop.cancelled() => None,
            };

            let outcome = match waited {
                Some(Ok(status)) if status.success() => Ok(()),
                Some(Ok(status)) => Err(TranscodeError::EncoderExited {
                    code: status.code(),
                    stderr: stderr_reader.await.unwrap_or_default().trim().to_string(),
                }),
                Some(Err(e)) => Err(TranscodeError::Io(e.to_string())),
                None => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill ffmpeg");
                    }
                    Err(TranscodeError::Aborted)
                }
            };
            // Receiver may be gone after teardown
            tx.send(outcome).ok();
        });

        self.completion = Some(rx);
        self.started = true;
        Ok(())
    }
}

#[async_trait]
impl Pipeline for FfmpegPipeline {
    async fn set_state(&mut self, state: PipelineState) -> std::result::Result<(), TranscodeError> {
        match state {
            PipelineState::Playing if !self.started => self.start()?,
            PipelineState::Null => self.stop.cancel(),
            _ => {}
        }
        self.state = state;
        Ok(())
    }

    fn state(&self) -> PipelineState {
        self.state
    }

    fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }
}

impl Drop for FfmpegPipeline {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(spec: &PipelineSpec) -> Vec<String> {
        ffmpeg_args(spec)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_bitrate_units() {
        assert_eq!(
            EncoderStage::for_profile(Encoder::Mp3, 192),
            Some(EncoderStage::Mp3 { bitrate_kbps: 192 })
        );
        assert_eq!(
            EncoderStage::for_profile(Encoder::Vorbis, 160),
            Some(EncoderStage::Vorbis {
                max_bitrate_bps: 160_000
            })
        );
        assert_eq!(
            EncoderStage::for_profile(Encoder::Aac, 128),
            Some(EncoderStage::Aac {
                bitrate_bps: 128_000
            })
        );
        assert_eq!(
            EncoderStage::for_profile(Encoder::Flac, 999),
            Some(EncoderStage::Flac)
        );
        assert_eq!(EncoderStage::for_profile(Encoder::None, 192), None);
    }

    #[test]
    fn test_mp3_args() {
        let spec = PipelineSpec::new(
            "/music/a.flac",
            "/tmp/out.mp3",
            EncoderStage::Mp3 { bitrate_kbps: 256 },
            false,
        );
        let args = args_of(&spec);

        assert_eq!(window(&args, "-i").as_deref(), Some("/music/a.flac"));
        assert_eq!(window(&args, "-ar").as_deref(), Some("44100"));
        assert_eq!(window(&args, "-ac").as_deref(), Some("2"));
        assert_eq!(window(&args, "-c:a").as_deref(), Some("libmp3lame"));
        assert_eq!(window(&args, "-b:a").as_deref(), Some("256k"));
        assert!(window(&args, "-af").is_none());
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp3"));
    }

    #[test]
    fn test_vorbis_and_aac_args_use_bits_per_second() {
        let vorbis = args_of(&PipelineSpec::new(
            "a.flac",
            "a.ogg",
            EncoderStage::Vorbis {
                max_bitrate_bps: 160_000,
            },
            false,
        ));
        assert_eq!(window(&vorbis, "-maxrate").as_deref(), Some("160000"));
        assert_eq!(window(&vorbis, "-f").as_deref(), Some("ogg"));

        let aac = args_of(&PipelineSpec::new(
            "a.flac",
            "a.m4a",
            EncoderStage::Aac {
                bitrate_bps: 128_000,
            },
            false,
        ));
        assert_eq!(window(&aac, "-b:a").as_deref(), Some("128000"));
    }

    #[test]
    fn test_normalization_filter() {
        let args = args_of(&PipelineSpec::new(
            "a.mp3",
            "b.flac",
            EncoderStage::Flac,
            true,
        ));
        let filter = window(&args, "-af").unwrap();
        assert!(filter.starts_with("volume=replaygain=track:replaygain_preamp=6.0"));
        assert!(filter.ends_with(",alimiter"));
        assert!(window(&args, "-b:a").is_none());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let factory = FfmpegPipelineFactory::new("/nonexistent/ffmpeg-for-tests");
        let spec = PipelineSpec::new("a.flac", "a.mp3", EncoderStage::Flac, false);

        let mut pipeline = factory.build(&spec).await.unwrap();
        let result = pipeline.set_state(PipelineState::Playing).await;

        assert!(matches!(result, Err(TranscodeError::PipelineBuild(_))));
        assert!(!factory.is_encoder_available(Encoder::Mp3).await);
        assert!(factory.is_encoder_available(Encoder::None).await);
    }
}
