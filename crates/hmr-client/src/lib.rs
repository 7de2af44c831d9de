//! Hot-update client runtime.
//!
//! Wires the registry, applier, queue and fallback controller together
//! behind [`HmrClient`]:
//!
//! ```ignore
//! use hmr_client::prelude::*;
//!
//! let client = HmrClient::new(HmrConfig::default(), platform)?;
//! client.start();
//!
//! client.registry().register(
//!     "/pages/home/index.js",
//!     HotModuleHandlers::new().on_accept(AcceptHandler::sync(|_, _| Ok(true))),
//! );
//!
//! // For every transport event:
//! client.handle_event("hmr", data);
//! ```

mod client;
mod platform;
pub mod sim;

pub use client::*;
pub use platform::*;

pub use hmr_core;
pub use hmr_executor;
pub use hmr_registry;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{HmrClient, Platform};
    pub use hmr_core::*;
    pub use hmr_executor::*;
    pub use hmr_registry::*;
}
