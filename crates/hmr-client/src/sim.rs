//! In-process page simulation.
//!
//! [`SimulatedPage`] stands in for the browser: it records every import,
//! stylesheet change, status update, fallback and reload in a journal, and
//! can be told which modules fail to import and which stylesheets fail to
//! load. [`ManualClock`] only moves when advanced.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, LocalBoxFuture};
use futures::task::LocalSpawn;
use futures::FutureExt;
use hmr_core::{
    Clock, DevStatus, FallbackInfo, HmrError, LinkEvent, MemoryMarkerStore, ModuleExports,
    ModuleLoader, PageControl, StatusSink, StyleSheetHost,
};
use hmr_executor::FallbackObserver;
use serde::Serialize;

use crate::platform::Platform;

/// Something observable that happened to the simulated page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageEvent {
    /// A module was imported.
    Import { specifier: String },
    /// A stylesheet link was added.
    StylesheetInserted { href: String },
    /// A stylesheet link was removed.
    StylesheetRemoved { href: String },
    /// The status indicator changed.
    Status {
        status: String,
        message: Option<String>,
    },
    /// The fallback observer was notified.
    Fallback { reason: String },
    /// The page reloaded.
    Reload,
}

/// Exports of a simulated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedModule {
    /// Specifier the module was imported with.
    pub specifier: String,
}

#[derive(Default)]
struct PageState {
    journal: RefCell<Vec<PageEvent>>,
    links: RefCell<Vec<(u32, String)>>,
    next_link: Cell<u32>,
    failing_imports: RefCell<Vec<String>>,
    broken_styles: RefCell<Vec<String>>,
    stalled_styles: RefCell<Vec<String>>,
    reloads: Cell<usize>,
}

/// A page that records what the runtime does to it.
///
/// Clones share the same page. Frames paint synchronously, so links
/// scheduled for removal on the next frame disappear immediately.
#[derive(Clone, Default)]
pub struct SimulatedPage {
    state: Rc<PageState>,
    marker: MemoryMarkerStore,
}

impl SimulatedPage {
    /// Create an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stylesheet link present at page load.
    pub fn with_stylesheet(self, href: impl Into<String>) -> Self {
        let id = self.allocate_link();
        self.state.links.borrow_mut().push((id, href.into()));
        self
    }

    /// Make imports whose specifier contains `fragment` fail.
    pub fn fail_import(&self, fragment: impl Into<String>) {
        self.state.failing_imports.borrow_mut().push(fragment.into());
    }

    /// Make stylesheets whose href contains `fragment` fire an error event.
    pub fn break_stylesheet(&self, fragment: impl Into<String>) {
        self.state.broken_styles.borrow_mut().push(fragment.into());
    }

    /// Make stylesheets whose href contains `fragment` never settle.
    pub fn stall_stylesheet(&self, fragment: impl Into<String>) {
        self.state.stalled_styles.borrow_mut().push(fragment.into());
    }

    /// Reuse the reload marker of a previous page instance.
    pub fn with_marker(mut self, marker: MemoryMarkerStore) -> Self {
        self.marker = marker;
        self
    }

    /// The page's reload marker storage.
    pub fn marker(&self) -> &MemoryMarkerStore {
        &self.marker
    }

    /// Everything that happened so far.
    pub fn journal(&self) -> Vec<PageEvent> {
        self.state.journal.borrow().clone()
    }

    /// Current stylesheet hrefs in document order.
    pub fn stylesheets(&self) -> Vec<String> {
        self.state
            .links
            .borrow()
            .iter()
            .map(|(_, href)| href.clone())
            .collect()
    }

    /// Number of reloads performed.
    pub fn reloads(&self) -> usize {
        self.state.reloads.get()
    }

    /// Status sink that records into the journal.
    pub fn status_sink(&self) -> Rc<dyn StatusSink> {
        let state = self.state.clone();
        Rc::new(move |status: DevStatus, message: Option<&str>| -> anyhow::Result<()> {
            state.journal.borrow_mut().push(PageEvent::Status {
                status: status.to_string(),
                message: message.map(String::from),
            });
            Ok(())
        })
    }

    /// Fallback observer that records into the journal.
    pub fn observer(&self) -> FallbackObserver {
        let state = self.state.clone();
        Rc::new(move |info: &FallbackInfo| -> anyhow::Result<()> {
            state.journal.borrow_mut().push(PageEvent::Fallback {
                reason: info.reason.to_string(),
            });
            Ok(())
        })
    }

    /// Bundle this page as a complete platform, status sink and observer
    /// included.
    pub fn platform(
        &self,
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Platform<SimulatedPage, SimulatedPage> {
        Platform::new(
            self.clone(),
            self.clone(),
            clock,
            Rc::new(self.clone()),
            Rc::new(self.marker.clone()),
            spawner,
        )
        .with_status_sink(self.status_sink())
        .with_observer(self.observer())
    }

    fn record(&self, event: PageEvent) {
        self.state.journal.borrow_mut().push(event);
    }

    fn allocate_link(&self) -> u32 {
        let id = self.state.next_link.get() + 1;
        self.state.next_link.set(id);
        id
    }

    fn matches(list: &RefCell<Vec<String>>, candidate: &str) -> bool {
        list.borrow()
            .iter()
            .any(|fragment| candidate.contains(fragment.as_str()))
    }
}

#[async_trait(?Send)]
impl ModuleLoader for SimulatedPage {
    async fn import(&self, specifier: &str) -> anyhow::Result<ModuleExports> {
        self.record(PageEvent::Import {
            specifier: specifier.to_string(),
        });
        if Self::matches(&self.state.failing_imports, specifier) {
            anyhow::bail!("Failed to fetch dynamically imported module: {specifier}");
        }
        Ok(ModuleExports::new(SimulatedModule {
            specifier: specifier.to_string(),
        }))
    }
}

impl StyleSheetHost for SimulatedPage {
    type Link = u32;

    fn stylesheet_links(&self) -> Vec<u32> {
        self.state.links.borrow().iter().map(|(id, _)| *id).collect()
    }

    fn href(&self, link: &u32) -> String {
        self.state
            .links
            .borrow()
            .iter()
            .find(|(id, _)| id == link)
            .map(|(_, href)| href.clone())
            .unwrap_or_default()
    }

    fn insert_stylesheet(
        &self,
        href: &str,
        after: Option<&u32>,
    ) -> Result<(u32, LocalBoxFuture<'static, LinkEvent>), HmrError> {
        let id = self.allocate_link();
        {
            let mut links = self.state.links.borrow_mut();
            let position = after
                .and_then(|anchor| links.iter().position(|(existing, _)| existing == anchor))
                .map(|index| index + 1)
                .unwrap_or(links.len());
            links.insert(position, (id, href.to_string()));
        }
        self.record(PageEvent::StylesheetInserted {
            href: href.to_string(),
        });

        let settled = if Self::matches(&self.state.stalled_styles, href) {
            future::pending().boxed_local()
        } else if Self::matches(&self.state.broken_styles, href) {
            future::ready(LinkEvent::Error).boxed_local()
        } else {
            future::ready(LinkEvent::Load).boxed_local()
        };
        Ok((id, settled))
    }

    fn remove(&self, link: &u32) {
        let href = self.href(link);
        self.state.links.borrow_mut().retain(|(id, _)| id != link);
        self.record(PageEvent::StylesheetRemoved { href });
    }

    fn remove_next_frame(&self, link: u32) {
        self.remove(&link);
    }
}

impl PageControl for SimulatedPage {
    fn reload(&self) {
        self.state.reloads.set(self.state.reloads.get() + 1);
        self.record(PageEvent::Reload);
    }
}

#[derive(Default)]
struct ClockState {
    now: Cell<u64>,
    waiting: RefCell<Vec<Waker>>,
}

/// Clock that only moves when advanced.
///
/// Every sleep yields at least once, even when already due.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Rc<ClockState>,
}

impl ManualClock {
    /// Create a clock reading `now` milliseconds.
    pub fn new(now: u64) -> Self {
        let clock = Self::default();
        clock.state.now.set(now);
        clock
    }

    /// Move time forward and wake due sleepers.
    pub fn advance(&self, duration: Duration) {
        let now = self.state.now.get() + duration.as_millis() as u64;
        self.state.now.set(now);
        for waker in self.state.waiting.borrow_mut().drain(..) {
            waker.wake();
        }
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.state.now.get()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Sleep {
            state: self.state.clone(),
            deadline: self.state.now.get() + duration.as_millis() as u64,
            yielded: false,
        }
        .boxed_local()
    }
}

struct Sleep {
    state: Rc<ClockState>,
    deadline: u64,
    yielded: bool,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let due = self.state.now.get() >= self.deadline;
        if due && self.yielded {
            return Poll::Ready(());
        }

        self.yielded = true;
        if due {
            cx.waker().wake_by_ref();
        } else {
            self.state.waiting.borrow_mut().push(cx.waker().clone());
        }
        Poll::Pending
    }
}
