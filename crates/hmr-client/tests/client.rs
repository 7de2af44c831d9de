use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::executor::LocalPool;
use futures::future;
use hmr_client::prelude::*;
use hmr_client::sim::{ManualClock, PageEvent, SimulatedModule, SimulatedPage};
use serde_json::{json, Value};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

struct Harness {
    pool: LocalPool,
    clock: ManualClock,
    page: SimulatedPage,
    client: HmrClient,
}

impl Harness {
    fn new(page: SimulatedPage) -> Self {
        Self::with_config(page, HmrConfig::default())
    }

    fn with_config(page: SimulatedPage, config: HmrConfig) -> Self {
        let pool = LocalPool::new();
        let clock = ManualClock::new(1_700_000_000_000);
        let platform = page.platform(Rc::new(clock.clone()), Rc::new(pool.spawner()));
        let client = HmrClient::new(config, platform).unwrap();

        Self {
            pool,
            clock,
            page,
            client,
        }
    }

    fn send(&self, payload: Value) {
        self.client.handle_event("hmr", &payload.to_string());
    }

    fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    fn advance(&mut self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
        self.settle();
    }

    fn imports(&self) -> Vec<String> {
        self.page
            .journal()
            .into_iter()
            .filter_map(|event| match event {
                PageEvent::Import { specifier } => Some(specifier),
                _ => None,
            })
            .collect()
    }

    fn marker(&self) -> Option<String> {
        self.page.marker().peek()
    }
}

fn module(url: &str, relative_path: &str) -> Value {
    Asset::js(url, relative_path).to_value()
}

fn style(url: &str) -> Value {
    Asset::css(url, url.trim_start_matches('/')).to_value()
}

/// Counts error-level events.
#[derive(Clone, Default)]
struct ErrorCount(Arc<AtomicUsize>);

impl ErrorCount {
    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCount {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` and count the errors it logs.
fn count_errors(f: impl FnOnce()) -> usize {
    let errors = ErrorCount::default();
    let subscriber = tracing_subscriber::registry().with(errors.clone());
    tracing::subscriber::with_default(subscriber, f);
    errors.get()
}

fn fallback_tail(reason: &str) -> Vec<PageEvent> {
    vec![
        PageEvent::Status {
            status: "hmr-fallback".into(),
            message: Some("Hot update fallback – reloading…".into()),
        },
        PageEvent::Fallback {
            reason: reason.into(),
        },
        PageEvent::Reload,
    ]
}

#[test]
fn test_empty_payload_changes_nothing() {
    let mut h = Harness::new(SimulatedPage::new().with_stylesheet("/app.css"));

    h.send(json!({"modules": [], "styles": [], "requiresReload": false}));
    h.settle();

    assert!(h.page.journal().is_empty());
    assert_eq!(h.page.stylesheets(), ["/app.css"]);
    assert_eq!(h.client.stats().hot_updates, 0);
    assert_eq!(h.page.reloads(), 0);
}

#[test]
fn test_module_without_handlers_is_hot_swapped() {
    let mut h = Harness::new(SimulatedPage::new());

    h.send(json!({
        "changedFile": "src/pages/home/index.ts",
        "modules": [module("/pages/home/index.js", "pages/home/index.js")],
        "styles": []
    }));
    h.settle();

    let imports = h.imports();
    assert_eq!(imports.len(), 1);
    assert!(imports[0].starts_with("/pages/home/index.js?hmr="));

    let exports = h.client.registry().current_exports("/pages/home/index.js").unwrap();
    assert_eq!(
        exports.downcast_ref::<SimulatedModule>().unwrap().specifier,
        imports[0]
    );
    assert_eq!(h.page.reloads(), 0);
    assert!(h.marker().is_none());
}

#[test]
fn test_declined_update_falls_back() {
    let mut h = Harness::new(SimulatedPage::new());
    h.client.registry().register(
        "/pages/home/index.js",
        HotModuleHandlers::new().on_accept(AcceptHandler::sync(|_, _| Ok(false))),
    );

    h.send(json!({"modules": [module("/pages/home/index.js", "index.js")]}));
    h.settle();

    let journal = h.page.journal();
    assert!(matches!(journal[0], PageEvent::Import { .. }));
    assert_eq!(journal[1..], fallback_tail("module.declined"));
    assert_eq!(h.marker().as_deref(), Some(" Reason: module.declined."));
    assert!(h.client.queue().is_reload_scheduled());
    assert_eq!(h.client.stats().reload_fallbacks, 1);
}

#[test]
fn test_broken_stylesheet_keeps_original() {
    let page = SimulatedPage::new()
        .with_stylesheet("/styles/base.css")
        .with_stylesheet("/styles/app.css");
    page.break_stylesheet("/styles/app.css?");
    let mut h = Harness::new(page);

    h.send(json!({"styles": [style("/styles/app.css")]}));
    h.settle();

    assert_eq!(h.page.stylesheets(), ["/styles/base.css", "/styles/app.css"]);

    let journal = h.page.journal();
    let PageEvent::StylesheetInserted { href: inserted } = &journal[0] else {
        panic!("expected an inserted stylesheet, got {journal:?}");
    };
    assert!(inserted.starts_with("/styles/app.css?hmr="));
    assert_eq!(
        journal[1],
        PageEvent::StylesheetRemoved {
            href: inserted.clone()
        }
    );
    assert_eq!(journal[2..], fallback_tail("style.swap"));
    assert_eq!(h.marker().as_deref(), Some(" Reason: style.swap."));
}

#[test]
fn test_stylesheet_swap_replaces_link() {
    let mut h = Harness::new(SimulatedPage::new().with_stylesheet("http://localhost/styles/app.css"));

    h.send(json!({"styles": [style("/styles/app.css")]}));
    h.settle();

    let sheets = h.page.stylesheets();
    assert_eq!(sheets.len(), 1);
    assert!(sheets[0].starts_with("/styles/app.css?hmr="));
    assert_eq!(h.client.stats().hot_updates, 1);
}

#[test]
fn test_requires_reload_writes_reasons() {
    let mut h = Harness::new(SimulatedPage::new());

    h.send(json!({
        "changedFile": "src/app/app.html",
        "requiresReload": true,
        "fallbackReasons": ["manual restart required"],
        "modules": [module("/app.js", "app.js")]
    }));
    h.settle();

    assert!(h.imports().is_empty());
    assert_eq!(h.page.journal(), fallback_tail("payload.requiresReload"));
    assert_eq!(
        h.marker().as_deref(),
        Some(" Reason: payload.requiresReload. Fallback reasons: manual restart required.")
    );
}

#[test]
fn test_later_payload_waits_for_slow_handler() {
    let mut h = Harness::new(SimulatedPage::new());
    let clock = h.clock.clone();
    h.client.registry().register(
        "/a.js",
        HotModuleHandlers::new().on_accept(AcceptHandler::new(move |_, _| {
            let pause = clock.sleep(Duration::from_millis(100));
            async move {
                pause.await;
                Ok(true)
            }
        })),
    );

    h.send(json!({"modules": [module("/a.js", "a.js")]}));
    h.send(json!({"modules": [module("/b.js", "b.js")]}));
    h.settle();

    assert_eq!(h.imports().len(), 1);
    assert!(h.client.queue().is_applying());
    assert_eq!(h.client.queue().pending_len(), 1);

    h.advance(100);

    let imports = h.imports();
    assert_eq!(imports.len(), 2);
    assert!(imports[1].starts_with("/b.js?hmr="));
    assert_eq!(h.client.stats().hot_updates, 2);
}

#[test]
fn test_nothing_applies_after_failure() {
    let page = SimulatedPage::new();
    page.fail_import("/broken.js");
    let mut h = Harness::new(page);

    h.send(json!({"changedFile": "src/broken.ts", "modules": [module("/broken.js", "broken.js")]}));
    h.send(json!({"modules": [module("/fine.js", "fine.js")]}));
    h.settle();
    h.send(json!({"modules": [module("/late.js", "late.js")]}));
    h.settle();

    let imports = h.imports();
    assert_eq!(imports.len(), 1);
    assert!(imports[0].starts_with("/broken.js?hmr="));
    assert_eq!(h.page.reloads(), 1);
    assert_eq!(h.marker().as_deref(), Some(" Reason: module.import."));
}

#[test]
fn test_unparseable_message_falls_back() {
    let mut h = Harness::new(SimulatedPage::new());

    h.client.handle_event("hmr", "{\"modules\": [");
    h.settle();

    assert_eq!(h.page.journal(), fallback_tail("payload.parse"));
    assert_eq!(h.marker().as_deref(), Some(" Reason: payload.parse."));
}

#[test]
fn test_unparseable_message_logs_one_error() {
    let mut h = Harness::new(SimulatedPage::new());

    let errors = count_errors(|| {
        h.client.handle_event("hmr", "{\"modules\": [");
        h.settle();
    });

    assert_eq!(errors, 1);
    assert_eq!(h.page.reloads(), 1);
}

#[test]
fn test_panicking_handler_falls_back() {
    let mut h = Harness::new(SimulatedPage::new());
    h.client.registry().register(
        "/a.js",
        HotModuleHandlers::new().on_accept(AcceptHandler::sync(
            |_, _| -> anyhow::Result<bool> { panic!("handler bug") },
        )),
    );

    let errors = count_errors(|| {
        h.send(json!({"modules": [module("/a.js", "a.js")]}));
        h.send(json!({"modules": [module("/b.js", "b.js")]}));
        h.settle();
    });

    assert!(!h.client.queue().is_applying());
    assert!(h.client.queue().is_reload_scheduled());
    assert_eq!(h.client.queue().pending_len(), 0);
    assert_eq!(h.imports().len(), 1);
    assert_eq!(h.page.reloads(), 1);
    assert_eq!(h.marker().as_deref(), Some(" Reason: runtime.error."));
    assert_eq!(h.client.stats().reload_fallbacks, 1);
    assert_eq!(errors, 1);
}

#[test]
fn test_empty_and_foreign_events_are_ignored() {
    let mut h = Harness::new(SimulatedPage::new());

    h.client.handle_event("hmr", "");
    h.client.handle_event("reload", "not json at all");
    h.settle();

    assert!(h.page.journal().is_empty());
    assert!(!h.client.queue().is_reload_scheduled());
}

#[test]
fn test_non_object_payload_is_invalid() {
    let mut h = Harness::new(SimulatedPage::new());

    h.client.handle_event("hmr", "[1, 2]");
    h.settle();

    assert_eq!(h.marker().as_deref(), Some(" Reason: payload.invalid."));
}

#[test]
fn test_marker_reported_by_next_page() {
    let mut first = Harness::new(SimulatedPage::new());
    first.send(json!({"requiresReload": true}));
    first.settle();

    let reloaded = SimulatedPage::new().with_marker(first.page.marker().clone());
    let second = Harness::new(reloaded);

    assert_eq!(
        second.client.start().as_deref(),
        Some(" Reason: payload.requiresReload.")
    );
    assert_eq!(second.client.start(), None);
}

#[test]
fn test_stalled_stylesheet_settles_on_timeout() {
    let page = SimulatedPage::new().with_stylesheet("/app.css");
    page.stall_stylesheet("/app.css?");
    let config = HmrConfig::default().with_style_settle_timeout(Duration::from_millis(250));
    let mut h = Harness::with_config(page, config);

    h.send(json!({"styles": [style("/app.css")]}));
    h.settle();
    assert!(h.client.queue().is_applying());
    assert_eq!(h.page.stylesheets().len(), 2);

    h.advance(250);

    let sheets = h.page.stylesheets();
    assert_eq!(sheets.len(), 1);
    assert!(sheets[0].starts_with("/app.css?hmr="));
    assert_eq!(h.page.reloads(), 0);
}

#[test]
fn test_handler_timeout_declines() {
    let config = HmrConfig::default().with_handler_timeout(Duration::from_millis(1_000));
    let mut h = Harness::with_config(SimulatedPage::new(), config);
    h.client.registry().register(
        "/a.js",
        HotModuleHandlers::new().on_accept(AcceptHandler::new(|_, _| future::pending())),
    );

    h.send(json!({"modules": [module("/a.js", "a.js")]}));
    h.settle();
    assert_eq!(h.page.reloads(), 0);

    h.advance(1_000);

    assert_eq!(h.marker().as_deref(), Some(" Reason: module.declined."));
    assert_eq!(h.page.reloads(), 1);
}

#[test]
fn test_reregistration_keeps_exports() {
    let mut h = Harness::new(SimulatedPage::new());
    h.send(json!({"modules": [module("/a.js", "a.js")]}));
    h.settle();
    let before = h.client.registry().current_exports("/a.js").unwrap();

    h.client.registry().register(
        "/a.js",
        HotModuleHandlers::new().on_accept(AcceptHandler::sync(|_, _| Ok(false))),
    );
    h.client.registry().register(
        "http://localhost/a.js?v=2",
        HotModuleHandlers::new().on_accept(AcceptHandler::sync(|_, context| {
            Ok(context.previous_exports.is_some())
        })),
    );

    let after = h.client.registry().current_exports("/a.js").unwrap();
    assert!(before.ptr_eq(&after));

    h.send(json!({"modules": [module("/a.js", "a.js")]}));
    h.settle();

    assert_eq!(h.client.stats().hot_updates, 2);
    assert_eq!(h.page.reloads(), 0);
}
