//! Full-reload fallback for updates that cannot be hot-applied.

use std::rc::Rc;
use std::time::Duration;

use futures::task::{LocalSpawn, LocalSpawnExt};
use hmr_core::{
    changed_file, fallback_reasons, Clock, DevStatus, FailureReason, FallbackInfo, HmrConfig,
    MarkerStore, PageControl, StatusSink, UpdateFailure,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::stats::UpdateStats;

/// Hook told about every fallback before the page reloads.
pub type FallbackObserver = Rc<dyn Fn(&FallbackInfo) -> anyhow::Result<()>>;

/// Why the page is about to reload.
#[derive(Debug)]
pub struct FallbackRequest {
    /// Reason tag.
    pub reason: FailureReason,
    /// Underlying error, if any.
    pub error: Option<anyhow::Error>,
    /// Raw payload being applied. Absent for unparseable messages.
    pub payload: Option<Value>,
    /// Raw entry that caused the failure.
    pub details: Option<Value>,
}

impl FallbackRequest {
    /// Create a request with only a reason.
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            error: None,
            payload: None,
            details: None,
        }
    }

    /// Build a request from a failed payload.
    pub fn from_failure(failure: UpdateFailure, payload: Value) -> Self {
        Self {
            reason: failure.reason,
            error: failure.error,
            payload: Some(payload),
            details: failure.details,
        }
    }

    /// Attach the underlying error.
    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach the raw payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Text stored in the reload marker, e.g.
/// ` Reason: payload.requiresReload. Fallback reasons: a, b.`
pub fn marker_text(reason: FailureReason, fallback_reasons: &[String]) -> String {
    let mut text = format!(" Reason: {reason}.");
    if !fallback_reasons.is_empty() {
        text.push_str(&format!(" Fallback reasons: {}.", fallback_reasons.join(", ")));
    }
    text
}

/// Reports a failed update and reloads the page.
///
/// Each step is best effort: a failing marker store, status sink or
/// observer never prevents the reload.
pub struct FallbackController {
    marker: Rc<dyn MarkerStore>,
    page: Rc<dyn PageControl>,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
    stats: Rc<UpdateStats>,
    status: Option<Rc<dyn StatusSink>>,
    observer: Option<FallbackObserver>,
    fallback_message: String,
}

impl FallbackController {
    /// Create a controller without status sink or observer.
    pub fn new(
        config: &HmrConfig,
        marker: Rc<dyn MarkerStore>,
        page: Rc<dyn PageControl>,
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn LocalSpawn>,
        stats: Rc<UpdateStats>,
    ) -> Self {
        Self {
            marker,
            page,
            clock,
            spawner,
            stats,
            status: None,
            observer: None,
            fallback_message: config.fallback_message.clone(),
        }
    }

    /// Report the fallback to a status indicator.
    pub fn with_status_sink(mut self, sink: Option<Rc<dyn StatusSink>>) -> Self {
        self.status = sink;
        self
    }

    /// Notify an observer of each fallback.
    pub fn with_observer(mut self, observer: Option<FallbackObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Record the failure and schedule the reload.
    pub fn trigger(&self, request: FallbackRequest) {
        let FallbackRequest {
            reason,
            error,
            payload,
            details,
        } = request;

        if let Some(error) = &error {
            error!(reason = %reason, error = %format!("{error:#}"), "Hot update failed");
        }

        let reasons = payload.as_ref().map(fallback_reasons).unwrap_or_default();
        let marker = marker_text(reason, &reasons);
        let changed_file = changed_file(payload.as_ref()).unwrap_or("unknown");
        warn!(
            reason = %reason,
            changed_file,
            "Falling back to full reload for {changed_file}.{marker}"
        );
        if let Some(details) = &details {
            debug!(reason = %reason, details = %details, "Failing entry");
        }

        if let Err(e) = self.marker.write_marker(&marker) {
            warn!(error = %e, "Failed to store reload marker");
        }

        if let Some(sink) = &self.status {
            if let Err(e) = sink.set_status(DevStatus::HmrFallback, Some(&self.fallback_message)) {
                debug!(error = %e, "Status handler failed");
            }
        }

        if let Some(observer) = &self.observer {
            let info = FallbackInfo {
                reason,
                payload,
                details,
            };
            if let Err(e) = observer(&info) {
                debug!(error = %e, "Fallback hook failed");
            }
        }

        self.stats.record_reload_fallback();
        self.schedule_reload();
    }

    /// Reload once the current task has yielded to the host.
    fn schedule_reload(&self) {
        let page = self.page.clone();
        let tick = self.clock.sleep(Duration::ZERO);
        let scheduled = self.spawner.spawn_local(async move {
            tick.await;
            page.reload();
        });

        if let Err(e) = scheduled {
            error!(error = %e, "Could not defer reload, reloading now");
            self.page.reload();
        }
    }
}
