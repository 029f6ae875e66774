//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `DeviceStorage` using `tokio::fs`. Sync targets are reached through
//!   whatever the OS mounts them as (USB mass storage, gvfs/MTP FUSE paths).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::TokioDeviceStorage;
//! use bridge_traits::DeviceStorage;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage: Arc<dyn DeviceStorage> = Arc::new(TokioDeviceStorage::new());
//!     // Hand to DeviceSyncEngine::new(...)
//! }
//! ```

mod filesystem;

pub use filesystem::TokioDeviceStorage;
