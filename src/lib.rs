//! Workspace facade crate.
//!
//! Re-exports the device sync workspace crates so host applications can depend
//! on `mpc-device-sync` alone. The `desktop-shims` feature (default) pulls in
//! the Tokio-backed storage bridge.

pub use bridge_traits;
pub use core_device_sync;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

pub use core_device_sync::{
    DeviceSyncConfig, DeviceSyncEngine, DeviceSyncError, EncodeProfile, Encoder, SyncReport,
    SyncSelection, SyncTarget,
};
