//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the device sync core:
//! - Logging and tracing infrastructure
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the sync engine depends on.
//! It establishes the logging conventions and the event broadcasting used to
//! report sync progress to whatever UI or host is listening.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
