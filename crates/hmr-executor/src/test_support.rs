//! Test doubles for the platform traits.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, LocalBoxFuture};
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use futures::FutureExt;
use hmr_core::{
    Clock, HmrError, LinkEvent, ModuleExports, ModuleLoader, PageControl, StyleSheetHost,
};

pub struct TestClock {
    now: Cell<u64>,
}

impl TestClock {
    pub fn new(now: u64) -> Rc<Self> {
        Rc::new(Self { now: Cell::new(now) })
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        future::ready(()).boxed_local()
    }
}

/// Records imports; specifiers containing a failing fragment error out.
#[derive(Clone, Default)]
pub struct RecordingLoader {
    pub imports: Rc<RefCell<Vec<String>>>,
    pub failing: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl ModuleLoader for RecordingLoader {
    async fn import(&self, specifier: &str) -> anyhow::Result<ModuleExports> {
        self.imports.borrow_mut().push(specifier.to_string());
        if self.failing.borrow().iter().any(|f| specifier.contains(f.as_str())) {
            anyhow::bail!("failed to fetch dynamically imported module: {specifier}");
        }
        Ok(ModuleExports::new(specifier.to_string()))
    }
}

/// Stylesheet links as `(id, href)` in document order.
#[derive(Clone, Default)]
pub struct FakeStyles {
    pub links: Rc<RefCell<Vec<(u32, String)>>>,
    pub next_id: Rc<Cell<u32>>,
    /// Settle event per href fragment; links never settle when mapped to `None`.
    pub events: Rc<RefCell<HashMap<String, Option<LinkEvent>>>>,
    pub frame_removals: Rc<RefCell<Vec<String>>>,
    pub mutations: Rc<Cell<usize>>,
}

impl FakeStyles {
    pub fn with_links(hrefs: &[&str]) -> Self {
        let styles = Self::default();
        for href in hrefs {
            let id = styles.allocate();
            styles.links.borrow_mut().push((id, href.to_string()));
        }
        styles
    }

    pub fn hrefs(&self) -> Vec<String> {
        self.links.borrow().iter().map(|(_, href)| href.clone()).collect()
    }

    fn allocate(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn event_for(&self, href: &str) -> Option<LinkEvent> {
        self.events
            .borrow()
            .iter()
            .find(|(fragment, _)| href.contains(fragment.as_str()))
            .map(|(_, event)| *event)
            .unwrap_or(Some(LinkEvent::Load))
    }
}

impl StyleSheetHost for FakeStyles {
    type Link = u32;

    fn stylesheet_links(&self) -> Vec<u32> {
        self.links.borrow().iter().map(|(id, _)| *id).collect()
    }

    fn href(&self, link: &u32) -> String {
        self.links
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
        self.mutations.set(self.mutations.get() + 1);
        let id = self.allocate();
        let mut links = self.links.borrow_mut();
        let position = after
            .and_then(|anchor| links.iter().position(|(existing, _)| existing == anchor))
            .map(|index| index + 1)
            .unwrap_or(links.len());
        links.insert(position, (id, href.to_string()));

        let settled = match self.event_for(href) {
            Some(event) => future::ready(event).boxed_local(),
            None => future::pending().boxed_local(),
        };
        Ok((id, settled))
    }

    fn remove(&self, link: &u32) {
        self.mutations.set(self.mutations.get() + 1);
        self.links.borrow_mut().retain(|(id, _)| id != link);
    }

    fn remove_next_frame(&self, link: u32) {
        let href = self.href(&link);
        self.frame_removals.borrow_mut().push(href);
        self.remove(&link);
    }
}

#[derive(Default)]
pub struct RecordingPage {
    pub reloads: Cell<usize>,
}

impl PageControl for RecordingPage {
    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

/// Spawner whose executor has already shut down.
pub struct ShutdownSpawner;

impl LocalSpawn for ShutdownSpawner {
    fn spawn_local_obj(&self, _future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}

/// Pending once, then ready.
#[derive(Default)]
pub struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
