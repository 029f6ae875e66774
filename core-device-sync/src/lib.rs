//! # Device Sync Module
//!
//! Mirrors a selection of library tracks onto a portable player's storage.
//!
//! ## Overview
//!
//! This module manages one-way synchronization to a device, including:
//! - Mapping tracks and album artwork to deterministic on-device paths
//! - Deleting files the selection no longer covers
//! - Skipping files the device ledger says are current
//! - Re-encoding to the device's target format through an external pipeline
//! - Persisting per-file modification times in a ledger on the device
//!
//! ## Components
//!
//! - **Selection** (`selection`): Tracks, albums and devices handed in by the host
//! - **Encode Profile** (`profile`): Target encoder, bitrate and normalization
//! - **Ledger** (`ledger`): On-device record of synced files and their source mtimes
//! - **Path Mapper** (`paths`): Album directory naming and name sanitizing
//! - **Tree Differ** (`differ`): Device enumeration, transfer plan and stale set
//! - **Pipeline** (`pipeline`): Encode pipeline contract and the ffmpeg backend
//! - **Transcode Orchestrator** (`transcode`): Copy or re-encode one file
//! - **Session State Machine** (`job`): Phases, counters and the final report
//! - **Engine** (`engine`): Runs sessions and publishes progress events

pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod job;
pub mod ledger;
pub mod paths;
pub mod pipeline;
pub mod profile;
pub mod selection;
pub mod transcode;

pub use config::{DeviceSyncConfig, DeviceSyncConfigBuilder};
pub use differ::{compute_stale, DeviceTree, PlanItem, PlanItemKind, SyncPlan, TreeDiffer};
pub use engine::DeviceSyncEngine;
pub use error::{DeviceSyncError, Result, TranscodeError};
pub use job::{SyncJobId, SyncPhase, SyncReport, SyncSession};
pub use ledger::SyncMetadataLedger;
pub use paths::PathMapper;
pub use pipeline::{
    EncoderStage, FfmpegPipelineFactory, Pipeline, PipelineFactory, PipelineSpec, PipelineState,
};
pub use profile::{EncodeProfile, Encoder};
pub use selection::{
    AlbumRef, DeviceId, SelectionProvider, SyncSelection, SyncTarget, SyncedCollection,
    SyncedDevices, TrackRef, TrackSource,
};
pub use transcode::{TranscodeOrchestrator, TransferDecision, TransferMethod, TransferOutcome};
