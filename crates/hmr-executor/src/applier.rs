//! Applies one update payload to the page.

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, Either};
use hmr_core::{
    normalize_path, with_cache_buster, Applied, ApplyOutcome, Asset, CacheBuster, Clock,
    FailureReason, HmrConfig, HmrError, HotModuleHooks, LinkEvent, ModuleLoader, StyleSheetHost,
    UpdateContext, UpdateFailure, UpdatePayload,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

/// Applies a raw payload and reports a structured outcome.
///
/// The queue only depends on this trait, so any applier (or a recording
/// stand-in) can be scheduled.
#[async_trait(?Send)]
pub trait ApplyUpdate {
    /// Apply one payload. Never called concurrently.
    async fn apply_update(&self, payload: &Value) -> ApplyOutcome;
}

/// Replaces script modules and stylesheets named by a payload.
///
/// Modules are applied first, strictly in order, then stylesheets. The
/// first failing asset aborts the payload; assets applied before it are not
/// rolled back, since the fallback reload follows immediately.
pub struct UpdateApplier<L, S> {
    hooks: Rc<dyn HotModuleHooks>,
    loader: L,
    styles: S,
    clock: Rc<dyn Clock>,
    origin: Url,
    cache_bust_param: String,
    style_settle_timeout: Duration,
    cache_buster: CacheBuster,
}

impl<L, S> UpdateApplier<L, S>
where
    L: ModuleLoader,
    S: StyleSheetHost,
{
    /// Create an applier.
    pub fn new(
        config: &HmrConfig,
        hooks: Rc<dyn HotModuleHooks>,
        loader: L,
        styles: S,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, HmrError> {
        Ok(Self {
            hooks,
            loader,
            styles,
            clock,
            origin: config.origin_url()?,
            cache_bust_param: config.cache_bust_param.clone(),
            style_settle_timeout: config.style_settle_timeout(),
            cache_buster: CacheBuster::new(),
        })
    }

    async fn apply(&self, raw: &Value) -> ApplyOutcome {
        let payload = UpdatePayload::from_value(raw)
            .ok_or_else(|| UpdateFailure::from(FailureReason::PayloadInvalid))?;

        if payload.requires_reload {
            return Err(FailureReason::PayloadRequiresReload.into());
        }

        if payload.is_empty() {
            info!("Received hot update with no changes");
            return Ok(Applied::NoChanges);
        }

        let now = self.clock.now_millis();
        let context = UpdateContext::base(
            payload.changed_file,
            payload.modules,
            payload.styles,
            self.cache_buster.issue(now),
            now,
        );

        self.apply_modules(&context).await?;
        self.apply_styles(&context).await?;

        info!(
            changed_file = context.changed_file_or_unknown(),
            "Applied hot update for {}",
            context.changed_file_or_unknown()
        );
        Ok(Applied::Replaced)
    }

    async fn apply_modules(&self, context: &UpdateContext) -> Result<(), UpdateFailure> {
        for entry in context.modules.iter() {
            let asset = Asset::from_value(entry).ok_or_else(|| {
                UpdateFailure::new(FailureReason::ModuleInvalid).with_details(entry.clone())
            })?;
            let module_context = context.for_asset(asset.clone());

            if !self.hooks.apply_dispose(&asset, module_context.clone()).await {
                return Err(
                    UpdateFailure::new(FailureReason::ModuleDispose).with_details(entry.clone())
                );
            }

            let specifier = self.cache_busted(&asset.url, context);
            let exports = self.loader.import(&specifier).await.map_err(|e| {
                UpdateFailure::new(FailureReason::ModuleImport)
                    .with_error(e)
                    .with_details(entry.clone())
            })?;

            if !self.hooks.apply_accept(exports, module_context).await {
                warn!(asset = %asset, "Accept handler declined update");
                return Err(
                    UpdateFailure::new(FailureReason::ModuleDeclined).with_details(entry.clone())
                );
            }
        }

        Ok(())
    }

    async fn apply_styles(&self, context: &UpdateContext) -> Result<(), UpdateFailure> {
        for entry in context.styles.iter() {
            let asset = Asset::from_value(entry).ok_or_else(|| {
                UpdateFailure::new(FailureReason::StyleInvalid).with_details(entry.clone())
            })?;

            if !self.swap_stylesheet(&asset, context).await {
                return Err(
                    UpdateFailure::new(FailureReason::StyleSwap).with_details(entry.clone())
                );
            }
        }

        Ok(())
    }

    /// Load a cache-busted copy of the stylesheet next to the current one,
    /// then drop the current one once the copy has painted.
    async fn swap_stylesheet(&self, asset: &Asset, context: &UpdateContext) -> bool {
        let specifier = self.cache_busted(&asset.url, context);
        let wanted = normalize_path(&asset.url, &self.origin);
        let target = self
            .styles
            .stylesheet_links()
            .into_iter()
            .find(|link| normalize_path(&self.styles.href(link), &self.origin) == wanted);

        let inserted = self.styles.insert_stylesheet(&specifier, target.as_ref());
        let (replacement, settled) = match inserted {
            Ok(inserted) => inserted,
            Err(e) => {
                error!(url = %asset.url, error = %e, "Could not insert replacement stylesheet");
                return false;
            }
        };
        let timeout = self.clock.sleep(self.style_settle_timeout);
        let event = match future::select(settled, timeout).await {
            Either::Left((event, _)) => event,
            Either::Right(_) => {
                debug!(url = %asset.url, "Stylesheet did not settle in time, assuming loaded");
                LinkEvent::Load
            }
        };

        match event {
            LinkEvent::Load => {
                if let Some(target) = target {
                    self.styles.remove_next_frame(target);
                }
                true
            }
            LinkEvent::Error => {
                error!(url = %asset.url, "Replacement stylesheet failed to load");
                self.styles.remove(&replacement);
                false
            }
        }
    }

    fn cache_busted(&self, url: &str, context: &UpdateContext) -> String {
        with_cache_buster(url, &context.cache_buster, &self.cache_bust_param, &self.origin)
    }
}

#[async_trait(?Send)]
impl<L, S> ApplyUpdate for UpdateApplier<L, S>
where
    L: ModuleLoader,
    S: StyleSheetHost,
{
    async fn apply_update(&self, payload: &Value) -> ApplyOutcome {
        self.apply(payload).await
    }
}
