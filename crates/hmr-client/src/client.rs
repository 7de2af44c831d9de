//! The client runtime.

use std::rc::Rc;

use hmr_core::{FailureReason, HmrConfig, HmrError, MarkerStore, ModuleLoader, StyleSheetHost};
use hmr_executor::{
    FallbackController, FallbackRequest, StatsSnapshot, UpdateApplier, UpdateQueue, UpdateStats,
};
use hmr_registry::ModuleRegistry;
use serde_json::Value;
use tracing::{debug, info};

use crate::platform::Platform;

/// One page's hot-update runtime.
///
/// Feed it transport events with [`handle_event`](Self::handle_event); page
/// code registers its handlers through [`registry`](Self::registry).
pub struct HmrClient {
    config: HmrConfig,
    registry: ModuleRegistry,
    queue: UpdateQueue,
    stats: Rc<UpdateStats>,
    marker: Rc<dyn MarkerStore>,
}

impl HmrClient {
    /// Build the runtime on top of a host platform.
    pub fn new<L, S>(config: HmrConfig, platform: Platform<L, S>) -> Result<Self, HmrError>
    where
        L: ModuleLoader + 'static,
        S: StyleSheetHost + 'static,
    {
        config.validate()?;

        let mut registry = ModuleRegistry::new(config.origin_url()?);
        if let Some(limit) = config.handler_timeout() {
            registry = registry.with_handler_timeout(limit, platform.clock.clone());
        }

        let stats = Rc::new(UpdateStats::new());
        let applier = UpdateApplier::new(
            &config,
            Rc::new(registry.clone()),
            platform.loader,
            platform.styles,
            platform.clock.clone(),
        )?;
        let fallback = FallbackController::new(
            &config,
            platform.marker.clone(),
            platform.page,
            platform.clock,
            platform.spawner.clone(),
            stats.clone(),
        )
        .with_status_sink(platform.status)
        .with_observer(platform.observer);
        let queue = UpdateQueue::new(
            Rc::new(applier),
            Rc::new(fallback),
            platform.spawner,
            stats.clone(),
        );

        Ok(Self {
            config,
            registry,
            queue,
            stats,
            marker: platform.marker,
        })
    }

    /// Report why the previous page load ended in a full reload.
    ///
    /// Call once when the page boots. The marker is cleared so it is only
    /// reported once.
    pub fn start(&self) -> Option<String> {
        let marker = self.marker.read_and_clear_marker()?;
        info!("Last update required full reload.{marker}");
        Some(marker)
    }

    /// Route a named transport event.
    pub fn handle_event(&self, event: &str, data: &str) {
        if event != self.config.event_name {
            debug!(event, "Ignoring transport event");
            return;
        }
        self.handle_message(data);
    }

    /// Handle the body of an update event.
    ///
    /// Empty bodies are ignored; anything that is not JSON forces a reload.
    pub fn handle_message(&self, data: &str) {
        if data.is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(payload) => self.queue.enqueue(payload),
            Err(e) => {
                let request =
                    FallbackRequest::new(FailureReason::PayloadParse).with_error(e.into());
                self.queue.request_reload(request);
            }
        }
    }

    /// Registration handle for page modules.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Update counters so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Queue introspection.
    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    /// Effective configuration.
    pub fn config(&self) -> &HmrConfig {
        &self.config
    }
}
