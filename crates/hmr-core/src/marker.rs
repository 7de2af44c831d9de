//! Diagnostic marker that survives a forced reload.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::HmrError;

/// Short-lived, per-tab storage for the reload diagnostic.
///
/// Written once right before a forced reload and read-and-cleared once by
/// the freshly loaded page.
pub trait MarkerStore {
    /// Persist the diagnostic, replacing any previous one.
    fn write_marker(&self, marker: &str) -> Result<(), HmrError>;

    /// Take the diagnostic, leaving the store empty.
    fn read_and_clear_marker(&self) -> Option<String>;
}

/// In-memory marker store.
///
/// Clones share the same slot, so a store handed to one client instance can
/// be read back by the next one in the same process.
#[derive(Debug, Clone, Default)]
pub struct MemoryMarkerStore {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemoryMarkerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Peek at the stored marker without clearing it.
    pub fn peek(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn write_marker(&self, marker: &str) -> Result<(), HmrError> {
        *self.slot.borrow_mut() = Some(marker.to_string());
        Ok(())
    }

    fn read_and_clear_marker(&self) -> Option<String> {
        self.slot.borrow_mut().take()
    }
}
