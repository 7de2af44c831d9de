//! Accept and dispose handlers supplied by page modules.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use hmr_core::{ModuleExports, UpdateContext};

type AcceptFn =
    dyn Fn(ModuleExports, UpdateContext) -> LocalBoxFuture<'static, anyhow::Result<bool>>;
type DisposeFn = dyn Fn(UpdateContext) -> LocalBoxFuture<'static, anyhow::Result<()>>;

/// Validates and consumes freshly imported exports.
///
/// Resolving to `Ok(false)` declines the update; an error is treated the
/// same way. Anything else accepts it.
#[derive(Clone)]
pub struct AcceptHandler(Rc<AcceptFn>);

impl AcceptHandler {
    /// Create a handler from an async function.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ModuleExports, UpdateContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + 'static,
    {
        Self(Rc::new(move |exports, context| {
            handler(exports, context).boxed_local()
        }))
    }

    /// Create a handler from a synchronous function.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&ModuleExports, &UpdateContext) -> anyhow::Result<bool> + 'static,
    {
        Self(Rc::new(move |exports, context| {
            future::ready(handler(&exports, &context)).boxed_local()
        }))
    }

    pub(crate) fn call(
        &self,
        exports: ModuleExports,
        context: UpdateContext,
    ) -> LocalBoxFuture<'static, anyhow::Result<bool>> {
        (self.0)(exports, context)
    }
}

impl fmt::Debug for AcceptHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AcceptHandler")
    }
}

/// Tears down a module's previous state before it is replaced.
///
/// An error marks the module as not cleanly disposed, which aborts the
/// update.
#[derive(Clone)]
pub struct DisposeHandler(Rc<DisposeFn>);

impl DisposeHandler {
    /// Create a handler from an async function.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(UpdateContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self(Rc::new(move |context| handler(context).boxed_local()))
    }

    /// Create a handler from a synchronous function.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&UpdateContext) -> anyhow::Result<()> + 'static,
    {
        Self(Rc::new(move |context| {
            future::ready(handler(&context)).boxed_local()
        }))
    }

    pub(crate) fn call(
        &self,
        context: UpdateContext,
    ) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        (self.0)(context)
    }
}

impl fmt::Debug for DisposeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DisposeHandler")
    }
}

/// Handlers a module registers for itself.
#[derive(Debug, Clone, Default)]
pub struct HotModuleHandlers {
    /// Accept handler.
    pub accept: Option<AcceptHandler>,
    /// Dispose handler.
    pub dispose: Option<DisposeHandler>,
}

impl HotModuleHandlers {
    /// Create an empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accept handler.
    pub fn on_accept(mut self, handler: AcceptHandler) -> Self {
        self.accept = Some(handler);
        self
    }

    /// Set the dispose handler.
    pub fn on_dispose(mut self, handler: DisposeHandler) -> Self {
        self.dispose = Some(handler);
        self
    }
}
