//! Hooks shared with JavaScript on the page.

use std::rc::Rc;

use hmr_client::prelude::*;
use js_sys::{Function, Promise, Reflect};
use serde_json::json;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::Window;

use crate::js_error;

/// `window.__hmrRegister(moduleId, { accept, dispose })`, installed by the
/// runtime for page modules.
pub const REGISTER_HOOK: &str = "__hmrRegister";

/// `window.__hmrSetDevStatus(status, message)`, installed by the status
/// indicator if there is one.
pub const STATUS_HOOK: &str = "__hmrSetDevStatus";

/// `window.__hmrOnFallback(info)`, installed by tooling that wants to know
/// about fallbacks.
pub const FALLBACK_HOOK: &str = "__hmrOnFallback";

fn window_function(window: &Window, name: &str) -> anyhow::Result<Option<Function>> {
    let value = Reflect::get(window, &JsValue::from_str(name)).map_err(js_error)?;
    Ok(value.dyn_into::<Function>().ok())
}

/// Forwards status changes to the page's indicator.
pub struct WindowStatus {
    window: Window,
}

impl WindowStatus {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl StatusSink for WindowStatus {
    fn set_status(&self, status: DevStatus, message: Option<&str>) -> anyhow::Result<()> {
        let Some(hook) = window_function(&self.window, STATUS_HOOK)? else {
            return Ok(());
        };
        let message = message.map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED);
        hook.call2(&JsValue::NULL, &JsValue::from_str(status.as_str()), &message)
            .map_err(js_error)?;
        Ok(())
    }
}

/// Observer calling the page's fallback hook with `{ reason, payload, details }`.
pub(crate) fn fallback_observer(window: Window) -> FallbackObserver {
    Rc::new(move |info: &FallbackInfo| -> anyhow::Result<()> {
        let Some(hook) = window_function(&window, FALLBACK_HOOK)? else {
            return Ok(());
        };
        let info = js_sys::JSON::parse(&serde_json::to_string(info)?).map_err(js_error)?;
        hook.call1(&JsValue::NULL, &info).map_err(js_error)?;
        Ok(())
    })
}

/// Expose the registry to JavaScript modules.
pub(crate) fn install_register_hook(
    window: &Window,
    registry: ModuleRegistry,
) -> Result<(), JsValue> {
    let register = Closure::wrap(Box::new(move |module_id: JsValue, handlers: JsValue| {
        let Some(module_id) = module_id.as_string() else {
            warn!("Ignoring hot module registration without a string id");
            return;
        };
        registry.register(&module_id, handlers_from_js(&handlers));
    }) as Box<dyn Fn(JsValue, JsValue)>);

    Reflect::set(window, &JsValue::from_str(REGISTER_HOOK), register.as_ref())?;
    register.forget();
    Ok(())
}

fn handlers_from_js(handlers: &JsValue) -> HotModuleHandlers {
    let function = |name: &str| {
        Reflect::get(handlers, &JsValue::from_str(name))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
    };

    let mut result = HotModuleHandlers::new();
    if let Some(accept) = function("accept") {
        result = result.on_accept(accept_handler(accept));
    }
    if let Some(dispose) = function("dispose") {
        result = result.on_dispose(dispose_handler(dispose));
    }
    result
}

fn accept_handler(function: Function) -> AcceptHandler {
    AcceptHandler::new(move |exports, context| call_accept(function.clone(), exports, context))
}

fn dispose_handler(function: Function) -> DisposeHandler {
    DisposeHandler::new(move |context| call_dispose(function.clone(), context))
}

/// A JS accept handler declines only by returning (or resolving to) a
/// literal `false`.
async fn call_accept(
    function: Function,
    exports: ModuleExports,
    context: UpdateContext,
) -> anyhow::Result<bool> {
    let namespace = exports
        .downcast_ref::<JsValue>()
        .cloned()
        .unwrap_or(JsValue::UNDEFINED);
    let context = context_to_js(&context).map_err(js_error)?;
    let returned = function
        .call2(&JsValue::NULL, &namespace, &context)
        .map_err(js_error)?;
    let settled = JsFuture::from(Promise::resolve(&returned))
        .await
        .map_err(js_error)?;
    Ok(settled.as_bool() != Some(false))
}

async fn call_dispose(function: Function, context: UpdateContext) -> anyhow::Result<()> {
    let context = context_to_js(&context).map_err(js_error)?;
    let returned = function.call1(&JsValue::NULL, &context).map_err(js_error)?;
    JsFuture::from(Promise::resolve(&returned))
        .await
        .map_err(js_error)?;
    Ok(())
}

fn context_to_js(context: &UpdateContext) -> Result<JsValue, JsValue> {
    let value = json!({
        "changedFile": context.changed_file,
        "modules": &*context.modules,
        "styles": &*context.styles,
        "cacheBuster": context.cache_buster,
        "timestamp": context.timestamp,
        "asset": context.asset.as_ref().map(Asset::to_value),
    });
    let object = js_sys::JSON::parse(&value.to_string())?;

    let previous = context
        .previous_exports
        .as_ref()
        .and_then(|exports| exports.downcast_ref::<JsValue>());
    if let Some(previous) = previous {
        Reflect::set(&object, &JsValue::from_str("previousExports"), previous)?;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use js_sys::Array;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn context() -> UpdateContext {
        let asset = Asset::js("/pages/home.js", "pages/home.js");
        UpdateContext::base(
            Some("src/pages/home.ts".into()),
            vec![asset.to_value()],
            Vec::new(),
            "abc123",
            42,
        )
        .for_asset(asset)
    }

    async fn accept(body: &str) -> anyhow::Result<bool> {
        let function = Function::new_with_args("exports, context", body);
        let exports = ModuleExports::new(JsValue::from_str("namespace"));
        call_accept(function, exports, context()).await
    }

    #[wasm_bindgen_test]
    async fn test_undefined_accepts() {
        assert!(accept("").await.unwrap());
        assert!(accept("return 0;").await.unwrap());
    }

    #[wasm_bindgen_test]
    async fn test_literal_false_declines() {
        assert!(!accept("return false;").await.unwrap());
    }

    #[wasm_bindgen_test]
    async fn test_resolved_false_declines() {
        assert!(!accept("return Promise.resolve(false);").await.unwrap());
        assert!(accept("return Promise.resolve(null);").await.unwrap());
    }

    #[wasm_bindgen_test]
    async fn test_thrown_error_fails() {
        let err = accept("throw new Error('accept broke');").await.unwrap_err();
        assert_eq!(err.to_string(), "accept broke");
    }

    #[wasm_bindgen_test]
    async fn test_accept_receives_exports_and_context() {
        let body = "return exports === 'namespace' && context.asset.url === '/pages/home.js';";
        assert!(accept(body).await.unwrap());
    }

    #[wasm_bindgen_test]
    async fn test_rejected_dispose_fails() {
        let reject =
            Function::new_with_args("context", "return Promise.reject(new Error('dispose broke'));");
        let err = call_dispose(reject, context()).await.unwrap_err();
        assert_eq!(err.to_string(), "dispose broke");

        let fine = Function::new_with_args("context", "context.seen = true;");
        assert!(call_dispose(fine, context()).await.is_ok());
    }

    #[wasm_bindgen_test]
    fn test_context_fields() {
        let previous = ModuleExports::new(JsValue::from_str("old namespace"));
        let object = context_to_js(&context().with_previous_exports(Some(previous))).unwrap();
        let get = |name: &str| Reflect::get(&object, &JsValue::from_str(name)).unwrap();

        assert_eq!(get("changedFile").as_string().as_deref(), Some("src/pages/home.ts"));
        assert_eq!(get("cacheBuster").as_string().as_deref(), Some("abc123"));
        assert_eq!(get("timestamp").as_f64(), Some(42.0));
        assert_eq!(Array::from(&get("modules")).length(), 1);
        assert_eq!(Array::from(&get("styles")).length(), 0);
        assert_eq!(get("previousExports").as_string().as_deref(), Some("old namespace"));

        let url = Reflect::get(&get("asset"), &JsValue::from_str("url")).unwrap();
        assert_eq!(url.as_string().as_deref(), Some("/pages/home.js"));
    }

    #[wasm_bindgen_test]
    fn test_context_without_previous_exports() {
        let object = context_to_js(&context()).unwrap();
        let has = Reflect::has(&object, &JsValue::from_str("previousExports")).unwrap();
        assert!(!has);
    }
}
