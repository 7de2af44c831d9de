//! Timers and tasks on the browser event loop.

use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use futures::FutureExt;
use hmr_client::prelude::*;
use js_sys::Promise;
use wasm_bindgen_futures::JsFuture;
use web_sys::Window;

/// `Date.now()` and `setTimeout`.
pub struct BrowserClock {
    window: Window,
}

impl BrowserClock {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Clock for BrowserClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let window = self.window.clone();
        let promise = Promise::new(&mut |resolve, reject| {
            if let Err(e) =
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            {
                let _ = reject.call1(&wasm_bindgen::JsValue::NULL, &e);
            }
        });

        JsFuture::from(promise).map(|_| ()).boxed_local()
    }
}

/// Runs tasks with `wasm_bindgen_futures::spawn_local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}
