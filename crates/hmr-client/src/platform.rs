//! Host capabilities handed to the client.

use std::rc::Rc;

use futures::task::LocalSpawn;
use hmr_core::{Clock, MarkerStore, ModuleLoader, PageControl, StatusSink, StyleSheetHost};
use hmr_executor::FallbackObserver;

/// Everything the runtime needs from its host.
///
/// `L` and `S` are owned by the applier; the rest is shared.
pub struct Platform<L, S> {
    /// Imports script modules.
    pub loader: L,
    /// Swaps stylesheet links.
    pub styles: S,
    /// Wall clock and timers.
    pub clock: Rc<dyn Clock>,
    /// Reloads the page.
    pub page: Rc<dyn PageControl>,
    /// Keeps the fallback diagnostic across the reload.
    pub marker: Rc<dyn MarkerStore>,
    /// Runs update tasks on the host's event loop.
    pub spawner: Rc<dyn LocalSpawn>,
    /// Development status indicator, if the page has one.
    pub status: Option<Rc<dyn StatusSink>>,
    /// Fallback observer, if one is installed.
    pub observer: Option<FallbackObserver>,
}

impl<L, S> Platform<L, S>
where
    L: ModuleLoader,
    S: StyleSheetHost,
{
    /// Bundle the required capabilities.
    pub fn new(
        loader: L,
        styles: S,
        clock: Rc<dyn Clock>,
        page: Rc<dyn PageControl>,
        marker: Rc<dyn MarkerStore>,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Self {
        Self {
            loader,
            styles,
            clock,
            page,
            marker,
            spawner,
            status: None,
            observer: None,
        }
    }

    /// Report fallbacks to a status indicator.
    pub fn with_status_sink(mut self, sink: Rc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Notify an observer of each fallback.
    pub fn with_observer(mut self, observer: FallbackObserver) -> Self {
        self.observer = Some(observer);
        self
    }
}
