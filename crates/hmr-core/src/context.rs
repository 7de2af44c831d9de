//! Update context handed to module handlers.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::payload::Asset;

/// Exports of an imported module.
///
/// Opaque to the runtime; handlers downcast to whatever the host's loader
/// produces. Cloning shares the same underlying value.
#[derive(Clone)]
pub struct ModuleExports(Rc<dyn Any>);

impl ModuleExports {
    /// Wrap a value as module exports.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the exports as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether two handles point at the same exports.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleExports").finish_non_exhaustive()
    }
}

/// Context for one payload, narrowed per asset while it is applied.
///
/// Constructed fresh for every payload and dropped when it settles.
#[derive(Debug, Clone)]
pub struct UpdateContext {
    /// Origin of the change, if the server reported one.
    pub changed_file: Option<String>,
    /// All script entries of the payload.
    pub modules: Rc<[Value]>,
    /// All stylesheet entries of the payload.
    pub styles: Rc<[Value]>,
    /// Cache-busting token shared by every asset of the payload.
    pub cache_buster: String,
    /// Milliseconds since the Unix epoch when the payload started applying.
    pub timestamp: u64,
    /// The asset currently being applied.
    pub asset: Option<Asset>,
    /// Exports accepted by the previous update of this module, if any.
    pub previous_exports: Option<ModuleExports>,
}

impl UpdateContext {
    /// Create the base context for a payload.
    pub fn base(
        changed_file: Option<String>,
        modules: Vec<Value>,
        styles: Vec<Value>,
        cache_buster: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            changed_file,
            modules: modules.into(),
            styles: styles.into(),
            cache_buster: cache_buster.into(),
            timestamp,
            asset: None,
            previous_exports: None,
        }
    }

    /// Narrow the context to one asset.
    pub fn for_asset(&self, asset: Asset) -> Self {
        Self {
            asset: Some(asset),
            previous_exports: None,
            ..self.clone()
        }
    }

    /// Attach the exports of the previous accepted update.
    pub fn with_previous_exports(mut self, exports: Option<ModuleExports>) -> Self {
        if exports.is_some() {
            self.previous_exports = exports;
        }
        self
    }

    /// Changed file for log messages.
    pub fn changed_file_or_unknown(&self) -> &str {
        self.changed_file.as_deref().unwrap_or("unknown")
    }
}
