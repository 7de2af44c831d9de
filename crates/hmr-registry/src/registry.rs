//! Registry of hot-replaceable modules.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, Either, LocalBoxFuture};
use hmr_core::{normalize_module_id, Asset, Clock, HotModuleHooks, ModuleExports, UpdateContext};
use tracing::{debug, error, warn};
use url::Url;

use crate::handlers::{AcceptHandler, DisposeHandler, HotModuleHandlers};

/// Last-known state of one module.
#[derive(Debug, Default)]
struct ModuleRecord {
    accept: Option<AcceptHandler>,
    dispose: Option<DisposeHandler>,
    current_exports: Option<ModuleExports>,
}

/// Upper bound for handler execution.
#[derive(Clone)]
struct HandlerTimeout {
    limit: Duration,
    clock: Rc<dyn Clock>,
}

/// Maps normalised module ids to their handlers and last accepted exports.
///
/// Cloning yields another handle to the same registry: the runtime keeps one
/// for the applier and page code keeps one to register handlers. Records are
/// created lazily and live as long as the page.
#[derive(Clone)]
pub struct ModuleRegistry {
    records: Rc<RefCell<HashMap<String, ModuleRecord>>>,
    origin: Rc<Url>,
    timeout: Option<HandlerTimeout>,
}

impl ModuleRegistry {
    /// Create an empty registry resolving module ids against `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            records: Rc::new(RefCell::new(HashMap::new())),
            origin: Rc::new(origin),
            timeout: None,
        }
    }

    /// Treat handlers that do not settle within `limit` as failed.
    pub fn with_handler_timeout(mut self, limit: Duration, clock: Rc<dyn Clock>) -> Self {
        self.timeout = Some(HandlerTimeout { limit, clock });
        self
    }

    /// Register a module's handlers.
    ///
    /// Re-registration replaces both handler slots (a missing handler clears
    /// its slot) and keeps the module's last accepted exports. Ids that
    /// normalise to nothing are ignored.
    pub fn register(&self, module_id: &str, handlers: HotModuleHandlers) {
        let Some(id) = normalize_module_id(Some(module_id), &self.origin) else {
            debug!(module_id, "Ignoring registration without a module id");
            return;
        };

        let mut records = self.records.borrow_mut();
        let record = records.entry(id).or_default();
        record.accept = handlers.accept;
        record.dispose = handlers.dispose;
    }

    /// Dispose the module behind `asset`.
    ///
    /// Succeeds trivially when the module is unknown or has no dispose
    /// handler. A failing or timed-out handler yields `false`.
    pub async fn dispose(&self, asset: &Asset, context: UpdateContext) -> bool {
        let Some(id) = self.module_id(Some(asset)) else {
            return true;
        };

        let (handler, previous) = {
            let records = self.records.borrow();
            match records.get(&id) {
                Some(ModuleRecord {
                    dispose: Some(handler),
                    current_exports,
                    ..
                }) => (handler.clone(), current_exports.clone()),
                _ => return true,
            }
        };

        let context = context.with_previous_exports(previous);
        match self.settle(handler.call(context)).await {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                error!(module_id = %id, error = %e, "Dispose handler failed");
                false
            }
            None => {
                warn!(module_id = %id, "Dispose handler timed out");
                false
            }
        }
    }

    /// Offer new exports for the module named by `context.asset`.
    ///
    /// Creates the record if needed. On acceptance the exports become the
    /// module's current exports and are handed to the next update as
    /// `previous_exports`.
    pub async fn accept(&self, exports: ModuleExports, context: UpdateContext) -> bool {
        let Some(id) = self.module_id(context.asset.as_ref()) else {
            return true;
        };

        let (handler, previous) = {
            let mut records = self.records.borrow_mut();
            let record = records.entry(id.clone()).or_default();
            (record.accept.clone(), record.current_exports.clone())
        };

        let accepted = match handler {
            None => true,
            Some(handler) => {
                let context = context.with_previous_exports(previous);
                match self.settle(handler.call(exports.clone(), context)).await {
                    Some(Ok(accepted)) => accepted,
                    Some(Err(e)) => {
                        error!(module_id = %id, error = %e, "Accept handler failed");
                        false
                    }
                    None => {
                        warn!(module_id = %id, "Accept handler timed out");
                        false
                    }
                }
            }
        };

        if accepted {
            if let Some(record) = self.records.borrow_mut().get_mut(&id) {
                record.current_exports = Some(exports);
            }
        }

        accepted
    }

    /// Whether a record exists for a module id.
    pub fn contains(&self, module_id: &str) -> bool {
        normalize_module_id(Some(module_id), &self.origin)
            .map(|id| self.records.borrow().contains_key(&id))
            .unwrap_or(false)
    }

    /// Last accepted exports of a module.
    pub fn current_exports(&self, module_id: &str) -> Option<ModuleExports> {
        let id = normalize_module_id(Some(module_id), &self.origin)?;
        self.records.borrow().get(&id)?.current_exports.clone()
    }

    /// Number of known modules.
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether no module is known.
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    fn module_id(&self, asset: Option<&Asset>) -> Option<String> {
        let candidate = asset.map(|asset| {
            if asset.url.is_empty() {
                asset.relative_path.as_str()
            } else {
                asset.url.as_str()
            }
        });
        normalize_module_id(candidate, &self.origin)
    }

    /// Await a handler, bounded by the timeout if one is set. `None` means
    /// the handler timed out.
    async fn settle<T>(&self, handler: LocalBoxFuture<'static, T>) -> Option<T> {
        let Some(timeout) = &self.timeout else {
            return Some(handler.await);
        };

        match future::select(handler, timeout.clock.sleep(timeout.limit)).await {
            Either::Left((value, _)) => Some(value),
            Either::Right(_) => None,
        }
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.len())
            .field("origin", &self.origin.as_str())
            .finish()
    }
}

#[async_trait(?Send)]
impl HotModuleHooks for ModuleRegistry {
    async fn apply_dispose(&self, asset: &Asset, context: UpdateContext) -> bool {
        self.dispose(asset, context).await
    }

    async fn apply_accept(&self, exports: ModuleExports, context: UpdateContext) -> bool {
        self.accept(exports, context).await
    }
}
