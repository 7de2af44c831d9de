//! Browser bindings for the hot-update client runtime.
//!
//! Compiled only for `wasm32`. [`boot`] checks the environment, wires an
//! [`HmrClient`](hmr_client::HmrClient) to the page and subscribes it to the
//! development server's event stream:
//!
//! - `console` - `tracing` output to the browser console
//! - `dom` - Stylesheet links, dynamic imports, reload and reload marker
//! - `runtime` - Clock, timers and task spawning on the browser event loop
//! - `bridge` - `window.__hmrRegister`, status indicator and fallback hook
//! - `transport` - `EventSource` subscription

#![cfg(target_arch = "wasm32")]

mod bridge;
mod console;
mod dom;
mod runtime;
mod transport;

use std::rc::Rc;

use hmr_client::prelude::*;
use js_sys::Reflect;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use wasm_bindgen::prelude::*;

pub use bridge::{WindowStatus, FALLBACK_HOOK, REGISTER_HOOK, STATUS_HOOK};
pub use console::{install as install_console_logging, MakeConsoleWriter, CONSOLE_PREFIX};
pub use dom::{DomStyleSheets, DynamicImport, SessionMarker, WindowPage};
pub use runtime::{BrowserClock, BrowserSpawner};
pub use transport::EVENT_SOURCE_PROPERTY;

/// Entry point run when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    console::install(LevelFilter::INFO);

    if let Err(e) = boot(HmrConfig::default()) {
        web_sys::console::error_2(&JsValue::from_str("Hot update runtime failed to start"), &e);
    }
}

/// Start the runtime on the current page.
///
/// The reason for the previous page's fallback reload, if any, is logged
/// through `tracing`; call [`install_console_logging`] first to see it.
///
/// Returns `None` when the page cannot take hot updates: outside a browser,
/// or without `EventSource`, in which case the dev server's full reloads
/// still apply.
pub fn boot(config: HmrConfig) -> Result<Option<Rc<HmrClient>>, JsValue> {
    let Some(window) = web_sys::window() else {
        warn!("Browser runtime not detected; hot updates disabled");
        return Ok(None);
    };
    let Some(document) = window.document() else {
        warn!("Browser runtime not detected; hot updates disabled");
        return Ok(None);
    };
    if !Reflect::has(&window, &JsValue::from_str("EventSource"))? {
        warn!("EventSource API unavailable; falling back to full reloads");
        return Ok(None);
    }

    let config = config.with_origin(window.location().origin()?);
    let platform = Platform::new(
        DynamicImport,
        DomStyleSheets::new(window.clone(), document),
        Rc::new(BrowserClock::new(window.clone())),
        Rc::new(WindowPage::new(window.clone())),
        Rc::new(SessionMarker::new(window.clone(), &config.marker_key)),
        Rc::new(BrowserSpawner),
    )
    .with_status_sink(Rc::new(WindowStatus::new(window.clone())))
    .with_observer(bridge::fallback_observer(window.clone()));

    let client =
        Rc::new(HmrClient::new(config, platform).map_err(|e| JsValue::from_str(&e.to_string()))?);
    client.start();

    bridge::install_register_hook(&window, client.registry().clone())?;
    transport::connect(&window, client.clone())?;

    Ok(Some(client))
}

/// Describe a thrown JavaScript value.
pub(crate) fn js_error(value: JsValue) -> anyhow::Error {
    if let Some(message) = value.as_string() {
        return anyhow::anyhow!(message);
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return anyhow::anyhow!(String::from(error.message()));
    }
    anyhow::anyhow!("{value:?}")
}
