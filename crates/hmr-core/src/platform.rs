//! Capabilities the host environment provides to the runtime.
//!
//! Everything here runs on a single thread: futures are `!Send` and shared
//! state lives behind `Rc`.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;

use crate::context::{ModuleExports, UpdateContext};
use crate::error::HmrError;
use crate::payload::Asset;

/// Wall clock and timers.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Resolve after `duration`. A zero duration still yields to the host
    /// event loop once.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Loads script modules.
#[async_trait(?Send)]
pub trait ModuleLoader {
    /// Import a module by specifier and return its exports.
    ///
    /// The specifier already carries a cache-busting parameter, so the
    /// loader must not reuse a cached instance.
    async fn import(&self, specifier: &str) -> anyhow::Result<ModuleExports>;
}

/// Settle event of a replacement stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The stylesheet loaded.
    Load,
    /// The stylesheet failed to load.
    Error,
}

/// Access to the document's stylesheet links.
pub trait StyleSheetHost {
    /// Handle to one `<link rel="stylesheet">` element.
    type Link: Clone;

    /// All stylesheet links currently in the document, in document order.
    fn stylesheet_links(&self) -> Vec<Self::Link>;

    /// Resolved `href` of a link.
    fn href(&self, link: &Self::Link) -> String;

    /// Insert a new stylesheet link right after `after`, or at the end of the
    /// document head.
    ///
    /// Returns the new link and a future resolving with its first load or
    /// error event. Listeners are attached before this returns.
    fn insert_stylesheet(
        &self,
        href: &str,
        after: Option<&Self::Link>,
    ) -> Result<(Self::Link, LocalBoxFuture<'static, LinkEvent>), HmrError>;

    /// Remove a link immediately.
    fn remove(&self, link: &Self::Link);

    /// Remove a link once the next frame has been painted.
    fn remove_next_frame(&self, link: Self::Link);
}

/// Control over the page itself.
pub trait PageControl {
    /// Perform a full page reload.
    fn reload(&self);
}

/// The two entry points the applier calls for every script asset.
///
/// Implemented by the module registry; page code registers handlers through
/// the registry and never calls these directly.
#[async_trait(?Send)]
pub trait HotModuleHooks {
    /// Tear down the previous instance of the asset's module.
    ///
    /// Returns `false` when the module could not be cleanly disposed.
    async fn apply_dispose(&self, asset: &Asset, context: UpdateContext) -> bool;

    /// Offer freshly imported exports to the module's accept handler.
    ///
    /// Returns `false` when the update is declined.
    async fn apply_accept(&self, exports: ModuleExports, context: UpdateContext) -> bool;
}
