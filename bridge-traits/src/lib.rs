//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the device
//! sync core.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and the
//! platform-specific code that actually touches storage. The engine never
//! calls `std::fs` or `tokio::fs` directly; every read, write, listing and
//! rename on either the media library or the sync target goes through
//! [`DeviceStorage`](storage::DeviceStorage). That keeps the engine testable
//! against in-memory storage and lets hosts route target access through MTP
//! mounts, FUSE layers or sandboxed document pickers.
//!
//! ## Traits
//!
//! - [`DeviceStorage`](storage::DeviceStorage) - File I/O on sources and the sync target
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform errors to `BridgeError` and keep
//! the offending path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared between the caller and the background sync task.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::storage::{DeviceStorage, DirEntry};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MtpStorage { /* ... */ }
//!
//! #[async_trait]
//! impl DeviceStorage for MtpStorage {
//!     async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
//!         // Implementation
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use storage::{DeviceStorage, DirEntry, EntryKind, FileMetadata};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
