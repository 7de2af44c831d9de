//! Page capabilities backed by the DOM.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use hmr_client::prelude::*;
use js_sys::Promise;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlLinkElement, Window};

use crate::js_error;

#[wasm_bindgen(inline_js = "
    export function hmr_import(specifier) {
        return import(specifier);
    }
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn hmr_import(specifier: &str) -> Result<Promise, JsValue>;
}

/// Loads modules with the native `import()`.
///
/// Exports are the module namespace object as a `JsValue`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicImport;

#[async_trait(?Send)]
impl ModuleLoader for DynamicImport {
    async fn import(&self, specifier: &str) -> anyhow::Result<ModuleExports> {
        let promise = hmr_import(specifier).map_err(js_error)?;
        let namespace = JsFuture::from(promise).await.map_err(js_error)?;
        Ok(ModuleExports::new(namespace))
    }
}

/// `<link rel="stylesheet">` elements of the document.
pub struct DomStyleSheets {
    window: Window,
    document: Document,
}

impl DomStyleSheets {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    fn create_link(&self, href: &str) -> Result<HtmlLinkElement, JsValue> {
        let link: HtmlLinkElement = self.document.create_element("link")?.dyn_into()?;
        link.set_rel("stylesheet");
        link.set_href(href);
        Ok(link)
    }

    fn attach(
        &self,
        link: &HtmlLinkElement,
        after: Option<&HtmlLinkElement>,
    ) -> Result<(), JsValue> {
        match after {
            Some(anchor) => anchor.after_with_node_1(link),
            None => {
                let head = self.document.head().ok_or("document has no head")?;
                head.append_child(link).map(|_| ())
            }
        }
    }
}

/// Resolves with the first `load` or `error` event of `link`.
fn settle(link: &HtmlLinkElement) -> LocalBoxFuture<'static, LinkEvent> {
    let promise = Promise::new(&mut |resolve, _reject| {
        let on_load = resolve.clone();
        let loaded = Closure::once_into_js(move || {
            let _ = on_load.call1(&JsValue::NULL, &JsValue::TRUE);
        });
        let failed = Closure::once_into_js(move || {
            let _ = resolve.call1(&JsValue::NULL, &JsValue::FALSE);
        });
        link.set_onload(Some(loaded.unchecked_ref()));
        link.set_onerror(Some(failed.unchecked_ref()));
    });

    JsFuture::from(promise)
        .map(|settled| match settled {
            Ok(value) if value.as_bool() == Some(true) => LinkEvent::Load,
            _ => LinkEvent::Error,
        })
        .boxed_local()
}

impl StyleSheetHost for DomStyleSheets {
    type Link = HtmlLinkElement;

    fn stylesheet_links(&self) -> Vec<HtmlLinkElement> {
        let Ok(nodes) = self.document.query_selector_all("link[rel=\"stylesheet\"]") else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|index| nodes.get(index))
            .filter_map(|node| node.dyn_into::<HtmlLinkElement>().ok())
            .collect()
    }

    fn href(&self, link: &HtmlLinkElement) -> String {
        link.href()
    }

    fn insert_stylesheet(
        &self,
        href: &str,
        after: Option<&HtmlLinkElement>,
    ) -> Result<(HtmlLinkElement, LocalBoxFuture<'static, LinkEvent>), HmrError> {
        let link = self
            .create_link(href)
            .map_err(|e| HmrError::Platform(js_error(e).to_string()))?;
        // Listeners go on before the element is attached so no event is missed.
        let settled = settle(&link);
        self.attach(&link, after)
            .map_err(|e| HmrError::Platform(js_error(e).to_string()))?;
        Ok((link, settled))
    }

    fn remove(&self, link: &HtmlLinkElement) {
        link.remove();
    }

    fn remove_next_frame(&self, link: HtmlLinkElement) {
        let target = link.clone();
        let callback = Closure::once_into_js(move || target.remove());
        if self
            .window
            .request_animation_frame(callback.unchecked_ref())
            .is_err()
        {
            link.remove();
        }
    }
}

/// Reloads through `location.reload()`.
pub struct WindowPage {
    window: Window,
}

impl WindowPage {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl PageControl for WindowPage {
    fn reload(&self) {
        if let Err(e) = self.window.location().reload() {
            debug!(error = %js_error(e), "location.reload() failed");
        }
    }
}

/// Reload marker kept in `sessionStorage`.
///
/// Pages without session storage (sandboxed frames, disabled storage) simply
/// never report a marker.
pub struct SessionMarker {
    window: Window,
    key: String,
}

impl SessionMarker {
    pub fn new(window: Window, key: &str) -> Self {
        Self {
            window,
            key: key.to_string(),
        }
    }

    fn storage(&self) -> Option<web_sys::Storage> {
        self.window.session_storage().ok().flatten()
    }
}

impl MarkerStore for SessionMarker {
    fn write_marker(&self, marker: &str) -> Result<(), HmrError> {
        let storage = self
            .storage()
            .ok_or_else(|| HmrError::Storage("sessionStorage unavailable".into()))?;
        storage
            .set_item(&self.key, marker)
            .map_err(|e| HmrError::Storage(js_error(e).to_string()))
    }

    fn read_and_clear_marker(&self) -> Option<String> {
        let storage = self.storage()?;
        let marker = storage.get_item(&self.key).ok().flatten()?;
        let _ = storage.remove_item(&self.key);
        Some(marker).filter(|marker| !marker.is_empty())
    }
}
