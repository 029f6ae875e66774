//! # Sync Session State Machine
//!
//! Tracks one device sync session from planning to its terminal state, with
//! validated phase transitions and per-session counters.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Planning → Deleting → Transferring → Finalizing → Idle
//!           │           │                         │
//!           └───────────┴──────> Finalizing       └──────> Errored
//! ```
//!
//! Planning and Deleting may jump straight to Finalizing when the session is
//! cancelled or the device root is unreachable. `Errored` means at least one
//! error was recorded; the engine itself stays reusable either way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::selection::DeviceId;
use crate::{DeviceSyncError, Result};

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from its string form
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DeviceSyncError::Config(format!("Invalid job ID {}: {}", s, e)))
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Planning,
    Deleting,
    Transferring,
    Finalizing,
    Errored,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Planning => "planning",
            SyncPhase::Deleting => "deleting",
            SyncPhase::Transferring => "transferring",
            SyncPhase::Finalizing => "finalizing",
            SyncPhase::Errored => "errored",
        }
    }

    /// Phases a session can end in
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Idle | SyncPhase::Errored)
    }

    fn can_transition_to(&self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, Planning)
                | (Planning, Deleting)
                | (Planning, Finalizing)
                | (Deleting, Transferring)
                | (Deleting, Finalizing)
                | (Transferring, Finalizing)
                | (Finalizing, Idle)
                | (Finalizing, Errored)
        )
    }
}

impl FromStr for SyncPhase {
    type Err = DeviceSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncPhase::Idle),
            "planning" => Ok(SyncPhase::Planning),
            "deleting" => Ok(SyncPhase::Deleting),
            "transferring" => Ok(SyncPhase::Transferring),
            "finalizing" => Ok(SyncPhase::Finalizing),
            "errored" => Ok(SyncPhase::Errored),
            _ => Err(DeviceSyncError::Config(format!("Unknown sync phase: {}", s))),
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable state of one running session.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub job_id: SyncJobId,
    pub device_id: DeviceId,
    phase: SyncPhase,
    pub planned: u64,
    pub completed: u64,
    pub transferred: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    pub cancelled: bool,
    pub fatal: bool,
}

impl SyncSession {
    pub fn new(job_id: SyncJobId, device_id: DeviceId) -> Self {
        Self {
            job_id,
            device_id,
            phase: SyncPhase::Idle,
            planned: 0,
            completed: 0,
            transferred: 0,
            skipped: 0,
            deleted: 0,
            errors: 0,
            last_error: None,
            cancelled: false,
            fatal: false,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: SyncPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(DeviceSyncError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
                reason: "transition not allowed".to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Count an error and keep its message as the latest one.
    pub fn record_error(&mut self, error: &DeviceSyncError) {
        self.errors += 1;
        self.last_error = Some(error.to_string());
        if error.is_fatal() {
            self.fatal = true;
        }
    }

    /// Fraction of planned items handled so far.
    pub fn progress(&self) -> f64 {
        if self.planned == 0 {
            1.0
        } else {
            (self.completed as f64 / self.planned as f64).min(1.0)
        }
    }

    pub fn report(&self, duration_secs: u64) -> SyncReport {
        SyncReport {
            job_id: self.job_id,
            phase: self.phase,
            planned: self.planned,
            transferred: self.transferred,
            skipped: self.skipped,
            deleted: self.deleted,
            errors: self.errors,
            last_error: self.last_error.clone(),
            cancelled: self.cancelled,
            duration_secs,
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub job_id: SyncJobId,
    pub phase: SyncPhase,
    pub planned: u64,
    pub transferred: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errors: u64,
    /// Only the most recent error is kept; details are in the logs
    pub last_error: Option<String>,
    pub cancelled: bool,
    pub duration_secs: u64,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors == 0 && !self.cancelled
    }
}
