//! Module registry for hot updates.
//!
//! Page modules register accept/dispose handlers here; the update applier
//! reaches them through the `HotModuleHooks` capability:
//! - `ModuleRegistry` - Normalised module id to handler/exports records
//! - `AcceptHandler` / `DisposeHandler` - Handler wrappers (sync or async)

mod handlers;
mod registry;

pub use handlers::*;
pub use registry::*;
