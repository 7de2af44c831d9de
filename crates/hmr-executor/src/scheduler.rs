//! Single-flight update queue.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};
use futures::FutureExt;
use hmr_core::{Applied, FailureReason, UpdateFailure};
use serde_json::Value;
use tracing::debug;

use crate::applier::ApplyUpdate;
use crate::fallback::{FallbackController, FallbackRequest};
use crate::stats::UpdateStats;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Value>,
    applying: bool,
    reload_scheduled: bool,
}

/// Applies payloads one at a time, in arrival order.
///
/// The first failure latches the queue: pending payloads are dropped, later
/// ones are ignored and the fallback controller takes over. Cloning yields
/// another handle to the same queue.
#[derive(Clone)]
pub struct UpdateQueue {
    state: Rc<RefCell<QueueState>>,
    applier: Rc<dyn ApplyUpdate>,
    fallback: Rc<FallbackController>,
    spawner: Rc<dyn LocalSpawn>,
    stats: Rc<UpdateStats>,
}

impl UpdateQueue {
    /// Create an empty queue.
    pub fn new(
        applier: Rc<dyn ApplyUpdate>,
        fallback: Rc<FallbackController>,
        spawner: Rc<dyn LocalSpawn>,
        stats: Rc<UpdateStats>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState::default())),
            applier,
            fallback,
            spawner,
            stats,
        }
    }

    /// Queue a payload and start applying it if nothing is in flight.
    pub fn enqueue(&self, payload: Value) {
        {
            let mut state = self.state.borrow_mut();
            if state.reload_scheduled {
                debug!("Reload already scheduled, dropping hot update");
                return;
            }
            state.pending.push_back(payload);
        }
        self.drain();
    }

    /// Give up on hot updates and reload the page.
    ///
    /// Only the first request is acted on.
    pub fn request_reload(&self, request: FallbackRequest) {
        {
            let mut state = self.state.borrow_mut();
            if state.reload_scheduled {
                debug!(reason = %request.reason, "Reload already scheduled");
                return;
            }
            state.reload_scheduled = true;
            state.pending.clear();
        }
        self.fallback.trigger(request);
    }

    /// Number of payloads waiting behind the one in flight.
    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Whether a payload is being applied.
    pub fn is_applying(&self) -> bool {
        self.state.borrow().applying
    }

    /// Whether the queue has latched into a reload.
    pub fn is_reload_scheduled(&self) -> bool {
        self.state.borrow().reload_scheduled
    }

    fn drain(&self) {
        let payload = {
            let mut state = self.state.borrow_mut();
            if state.applying || state.reload_scheduled {
                return;
            }
            let Some(payload) = state.pending.pop_front() else {
                return;
            };
            state.applying = true;
            payload
        };

        let attached = payload.clone();
        let queue = self.clone();
        if let Err(e) = self.spawner.spawn_local(queue.run(payload)) {
            self.state.borrow_mut().applying = false;
            self.request_reload(
                FallbackRequest::new(FailureReason::RuntimeSpawn)
                    .with_error(e.into())
                    .with_payload(attached),
            );
        }
    }

    async fn run(self, payload: Value) {
        let outcome = AssertUnwindSafe(self.applier.apply_update(&payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(crashed(panic)));
        self.state.borrow_mut().applying = false;

        match outcome {
            Ok(applied) => {
                if applied == Applied::Replaced {
                    self.stats.record_hot_update();
                }
                self.drain();
            }
            Err(failure) => self.request_reload(FallbackRequest::from_failure(failure, payload)),
        }
    }
}

/// Turn a panic raised while applying into a `runtime.error` failure.
fn crashed(panic: Box<dyn Any + Send>) -> UpdateFailure {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "apply panicked".to_string());
    UpdateFailure::new(FailureReason::RuntimeError).with_error(anyhow::anyhow!(message))
}
