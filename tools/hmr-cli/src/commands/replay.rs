//! Replay a recorded update stream against a simulated page.

use std::rc::Rc;

use anyhow::{bail, Context as _, Result};
use futures::executor::LocalPool;
use hmr_client::prelude::*;
use hmr_client::sim::{ManualClock, PageEvent, SimulatedPage};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ReplayArgs;
use crate::context::Context;

/// Wall clock the simulated page starts at.
const REPLAY_EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// One server event from a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Event name.
    pub event: String,
    /// Raw message data.
    pub data: String,
}

/// What one recorded event did to the page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStep {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_file: Option<String>,
    pub page: Vec<PageEvent>,
}

/// Outcome of a replay.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    /// Events left unplayed because the page had reloaded.
    pub skipped: usize,
    pub hot_updates: i64,
    pub reload_fallbacks: i64,
    pub reloads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub stylesheets: Vec<String>,
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read recording: {}", path.display()))?;

    let events = parse_recording(&content, &ctx.config.event_name);
    debug!(path = %path.display(), events = events.len(), "Parsed recording");
    if events.is_empty() {
        ctx.output.warn("Recording contains no events");
    }

    let expected = args.expect_stats.as_deref().map(parse_expected).transpose()?;

    ctx.output.header(&format!("Replaying {}", path.display()));
    let report = replay(&ctx.config, &args, &events)?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_report(&report, events.len(), ctx);
    }

    match expected {
        Some(expected) => check_stats(&report, expected),
        None => Ok(()),
    }
}

/// Read the `--expect-stats` counters.
fn parse_expected(raw: &str) -> Result<StatsSnapshot> {
    let value: Value = serde_json::from_str(raw).context("Invalid --expect-stats JSON")?;
    StatsSnapshot::from_value(&value)
        .context("--expect-stats needs numeric hotUpdates and reloadFallbacks")
}

fn check_stats(report: &ReplayReport, expected: StatsSnapshot) -> Result<()> {
    let actual = StatsSnapshot {
        hot_updates: report.hot_updates,
        reload_fallbacks: report.reload_fallbacks,
    };
    if actual != expected {
        bail!(
            "Expected {} hot update(s) and {} reload fallback(s), got {} and {}",
            expected.hot_updates,
            expected.reload_fallbacks,
            actual.hot_updates,
            actual.reload_fallbacks
        );
    }
    Ok(())
}

/// Parse a JSON-lines recording. Blank lines are skipped; lines that are
/// not an `{"event", "data"}` envelope are sent verbatim as `default_event`.
pub fn parse_recording(content: &str, default_event: &str) -> Vec<RecordedEvent> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_line(line, default_event))
        .collect()
}

fn parse_line(line: &str, default_event: &str) -> RecordedEvent {
    let envelope = serde_json::from_str::<Value>(line).ok().and_then(|value| {
        let event = value.get("event")?.as_str()?.to_string();
        let data = match value.get("data") {
            Some(Value::String(data)) => data.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Some(RecordedEvent { event, data })
    });

    envelope.unwrap_or_else(|| RecordedEvent {
        event: default_event.to_string(),
        data: line.to_string(),
    })
}

/// Feed `events` through a client wired to a simulated page.
///
/// Each event runs to completion before the next is sent. Once the page
/// reloads the remaining events are skipped.
pub fn replay(
    config: &HmrConfig,
    args: &ReplayArgs,
    events: &[RecordedEvent],
) -> Result<ReplayReport> {
    let mut pool = LocalPool::new();
    let clock = ManualClock::new(REPLAY_EPOCH_MILLIS);

    let page = args
        .stylesheet
        .iter()
        .fold(SimulatedPage::new(), |page, href| page.with_stylesheet(href.as_str()));
    for module in &args.fail_import {
        page.fail_import(module.as_str());
    }
    for stylesheet in &args.broken_style {
        page.break_stylesheet(stylesheet.as_str());
    }

    let platform = page.platform(Rc::new(clock.clone()), Rc::new(pool.spawner()));
    let client = HmrClient::new(config.clone(), platform)?;

    for module in &args.decline {
        client.registry().register(
            module,
            HotModuleHandlers::new().on_accept(AcceptHandler::sync(|_, _| Ok(false))),
        );
    }

    let mut steps = Vec::with_capacity(events.len());
    let mut seen = 0;
    for recorded in events {
        if page.reloads() > 0 {
            break;
        }

        client.handle_event(&recorded.event, &recorded.data);
        pool.run_until_stalled();

        // Stalled on a timer: let the settle timeout run out.
        if client.queue().is_applying() {
            clock.advance(config.style_settle_timeout());
            pool.run_until_stalled();
        }

        let journal = page.journal();
        steps.push(ReplayStep {
            event: recorded.event.clone(),
            changed_file: changed_file_of(&recorded.data),
            page: journal[seen..].to_vec(),
        });
        seen = journal.len();
    }

    let stats = client.stats();
    Ok(ReplayReport {
        skipped: events.len() - steps.len(),
        steps,
        hot_updates: stats.hot_updates,
        reload_fallbacks: stats.reload_fallbacks,
        reloads: page.reloads(),
        marker: page.marker().peek(),
        stylesheets: page.stylesheets(),
    })
}

fn changed_file_of(data: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(data).ok()?;
    payload.get("changedFile")?.as_str().map(String::from)
}

fn print_report(report: &ReplayReport, total: usize, ctx: &Context) {
    for (index, step) in report.steps.iter().enumerate() {
        let label = match &step.changed_file {
            Some(file) => format!("{} {}", step.event, file),
            None => step.event.clone(),
        };
        ctx.output.step(index + 1, total, &label);

        if step.page.is_empty() {
            ctx.output.debug("no page changes");
        }
        for event in &step.page {
            ctx.output.page_event(event);
        }
    }

    ctx.output.header("Summary");
    ctx.output.kv("hot updates", &report.hot_updates.to_string());
    ctx.output.kv("reload fallbacks", &report.reload_fallbacks.to_string());
    ctx.output.kv("stylesheets", &report.stylesheets.join(", "));
    if let Some(marker) = &report.marker {
        ctx.output.kv("reload marker", marker.trim());
    }

    if report.skipped > 0 {
        ctx.output.info(&format!(
            "{} event(s) not replayed after the page reloaded",
            report.skipped
        ));
    }
    if report.reloads > 0 {
        ctx.output.warn("Page fell back to a full reload");
    } else {
        ctx.output.success("All updates applied without a reload");
    }
}
