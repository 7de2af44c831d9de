//! Server-sent update events.

use std::rc::Rc;

use hmr_client::prelude::*;
use js_sys::Reflect;
use tracing::{debug, info};
use wasm_bindgen::prelude::*;
use web_sys::{EventSource, MessageEvent, Window};

use crate::bridge::WindowStatus;

/// Window property holding the page's `EventSource`, so a re-executed
/// runtime shares the existing connection.
pub const EVENT_SOURCE_PROPERTY: &str = "__hmrEventSource";

/// Reuse the page's connection or open one.
fn event_source(window: &Window, url: &str) -> Result<EventSource, JsValue> {
    let key = JsValue::from_str(EVENT_SOURCE_PROPERTY);
    if let Ok(existing) = Reflect::get(window, &key)?.dyn_into::<EventSource>() {
        debug!(url = %existing.url(), "Reusing event source");
        return Ok(existing);
    }

    let source = EventSource::new(url)?;
    Reflect::set(window, &key, &source)?;
    info!(url, "Opening update stream");
    Ok(source)
}

/// Route update events and connection state to the client.
pub(crate) fn connect(window: &Window, client: Rc<HmrClient>) -> Result<EventSource, JsValue> {
    let source = event_source(window, &client.config().event_source_url)?;
    let event_name = client.config().event_name.clone();

    let on_update = Closure::wrap(Box::new(move |event: MessageEvent| {
        let data = event.data().as_string().unwrap_or_default();
        client.handle_message(&data);
    }) as Box<dyn FnMut(MessageEvent)>);
    source.add_event_listener_with_callback(&event_name, on_update.as_ref().unchecked_ref())?;
    on_update.forget();

    let on_open = connection_status(window, DevStatus::Connected);
    source.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    on_open.forget();

    let on_error = connection_status(window, DevStatus::Disconnected);
    source.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    on_error.forget();

    Ok(source)
}

fn connection_status(window: &Window, status: DevStatus) -> Closure<dyn FnMut()> {
    let sink = WindowStatus::new(window.clone());
    Closure::wrap(Box::new(move || {
        if let Err(e) = sink.set_status(status, None) {
            debug!(error = %e, "Status handler failed");
        }
    }) as Box<dyn FnMut()>)
}
