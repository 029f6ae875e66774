//! # Event Bus System
//!
//! Provides the event channel the sync engine reports through, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchy (`CoreEvent` → `DeviceSyncEvent`)
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ DeviceSyncEngine ├──────────────>│ EventBus  ├─────────────────>│ UI / host  │
//! └──────────────────┘               │ (broadcast│                  └────────────┘
//!                                    │  channel) ├─────────────────>┌────────────┐
//!                                    └───────────┘                  │ Test probe │
//!                                                                   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DeviceSyncEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::DeviceSync(DeviceSyncEvent::Progress {
//!         job_id: "job-1".to_string(),
//!         device_id: "walkman".to_string(),
//!         completed: 1,
//!         total: 4,
//!         fraction: 0.25,
//!     }))
//!     .ok();
//!
//! let received = stream.recv().await.unwrap();
//! assert!(matches!(received, CoreEvent::DeviceSync(DeviceSyncEvent::Progress { .. })));
//! # }
//! ```
//!
//! ## Device Sync Events
//! - `Started`: session armed for a target
//! - `Progress`: fractional progress after each planned item
//! - `Errors`: one or more per-file failures; carries the most recent message only
//! - `Finished`: terminal signal, always emitted once per session
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; progress events are superseded by later ones anyway.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns an error; the engine ignores it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Device synchronization events
    DeviceSync(DeviceSyncEvent),
}

impl CoreEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::DeviceSync(e) => e.description(),
        }
    }

    /// Get the severity level of the event
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::DeviceSync(DeviceSyncEvent::Errors { .. }) => EventSeverity::Error,
            CoreEvent::DeviceSync(DeviceSyncEvent::Finished { cancelled: true, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::DeviceSync(DeviceSyncEvent::Finished { .. }) => EventSeverity::Info,
            CoreEvent::DeviceSync(DeviceSyncEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::DeviceSync(DeviceSyncEvent::Progress { .. }) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Device Sync Events
// ============================================================================

/// Events emitted by a device sync session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DeviceSyncEvent {
    /// A session was armed for a target
    Started {
        job_id: String,
        device_id: String,
        root: String,
    },

    /// Emitted after each planned item, transferred or skipped
    Progress {
        job_id: String,
        device_id: String,
        completed: u64,
        total: u64,
        /// `completed / total`, in `[0.0, 1.0]`
        fraction: f64,
    },

    /// Per-file failures occurred during the session
    ///
    /// Only the most recent message is carried; full detail lives in the logs.
    Errors {
        job_id: String,
        device_id: String,
        error_count: u64,
        message: String,
    },

    /// Terminal signal, emitted exactly once per session
    Finished {
        job_id: String,
        device_id: String,
        transferred: u64,
        skipped: u64,
        deleted: u64,
        errors: u64,
        cancelled: bool,
        duration_secs: u64,
    },
}

impl DeviceSyncEvent {
    fn description(&self) -> &str {
        match self {
            DeviceSyncEvent::Started { .. } => "Device sync started",
            DeviceSyncEvent::Progress { .. } => "Device sync in progress",
            DeviceSyncEvent::Errors { .. } => "Device sync finished with errors",
            DeviceSyncEvent::Finished { .. } => "Device sync finished",
        }
    }

    /// Job id the event belongs to
    pub fn job_id(&self) -> &str {
        match self {
            DeviceSyncEvent::Started { job_id, .. }
            | DeviceSyncEvent::Progress { job_id, .. }
            | DeviceSyncEvent::Errors { job_id, .. }
            | DeviceSyncEvent::Finished { job_id, .. } => job_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning is cheap; every clone shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to events from this bus.
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Event receiver with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receive the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(completed: u64, total: u64) -> CoreEvent {
        CoreEvent::DeviceSync(DeviceSyncEvent::Progress {
            job_id: "job-1".to_string(),
            device_id: "walkman".to_string(),
            completed,
            total,
            fraction: completed as f64 / total as f64,
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(progress(1, 2)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::DeviceSync(DeviceSyncEvent::Started {
            job_id: "job-1".to_string(),
            device_id: "walkman".to_string(),
            root: "/media/walkman".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).filter(|event| {
            matches!(event, CoreEvent::DeviceSync(DeviceSyncEvent::Finished { .. }))
        });

        bus.emit(progress(1, 2)).ok();
        let finished = CoreEvent::DeviceSync(DeviceSyncEvent::Finished {
            job_id: "job-1".to_string(),
            device_id: "walkman".to_string(),
            transferred: 2,
            skipped: 0,
            deleted: 0,
            errors: 0,
            cancelled: false,
            duration_secs: 3,
        });
        bus.emit(finished.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), finished);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 1..=5 {
            bus.emit(progress(i, 5)).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let errors = CoreEvent::DeviceSync(DeviceSyncEvent::Errors {
            job_id: "job-1".to_string(),
            device_id: "walkman".to_string(),
            error_count: 2,
            message: "permission denied".to_string(),
        });
        assert_eq!(errors.severity(), EventSeverity::Error);
        assert_eq!(progress(1, 2).severity(), EventSeverity::Debug);
        assert_eq!(errors.description(), "Device sync finished with errors");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(progress(1, 4)).unwrap();
        assert_eq!(json["type"], "DeviceSync");
        assert_eq!(json["payload"]["event"], "Progress");
        assert_eq!(json["payload"]["fraction"], 0.25);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, progress(1, 4));
    }

    #[test]
    fn test_job_id_accessor() {
        let CoreEvent::DeviceSync(event) = progress(1, 2);
        assert_eq!(event.job_id(), "job-1");
    }
}
