//! Single-flight application of hot-update payloads.
//!
//! This crate drives updates through the page:
//! - `UpdateApplier` - Replaces modules and stylesheets for one payload
//! - `UpdateQueue` - FIFO scheduler with one payload in flight and a reload latch
//! - `FallbackController` - Marker, status, observer and deferred reload
//! - `UpdateStats` - Hot update and fallback counters

mod applier;
mod fallback;
mod scheduler;
mod stats;

#[cfg(test)]
mod test_support;

pub use applier::*;
pub use fallback::*;
pub use scheduler::*;
pub use stats::*;
