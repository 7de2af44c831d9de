//! Core types and platform contracts for the hot-update client runtime.
//!
//! This crate provides the pieces every other layer builds on:
//! - `UpdatePayload` / `Asset` - Lenient decoding of build-server notifications
//! - `UpdateContext` - Per-payload and per-asset context handed to handlers
//! - `UpdateFailure` / `FailureReason` - Structured apply outcomes
//! - `HmrConfig` - Runtime configuration
//! - Platform traits (`ModuleLoader`, `StyleSheetHost`, `Clock`, `PageControl`,
//!   `MarkerStore`, `StatusSink`, `HotModuleHooks`) implemented by the host

mod config;
mod context;
mod error;
mod location;
mod marker;
mod outcome;
mod payload;
mod platform;
mod status;

pub use config::*;
pub use context::*;
pub use error::*;
pub use location::*;
pub use marker::*;
pub use outcome::*;
pub use payload::*;
pub use platform::*;
pub use status::*;
