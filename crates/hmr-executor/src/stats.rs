//! Hot update counters.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Counts applied updates and reload fallbacks for one page lifetime.
#[derive(Debug, Default)]
pub struct UpdateStats {
    hot_updates: Cell<u64>,
    reload_fallbacks: Cell<u64>,
}

impl UpdateStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload applied without reloading.
    pub fn record_hot_update(&self) {
        self.hot_updates.set(self.hot_updates.get() + 1);
    }

    /// Record a fallback to a full reload.
    pub fn record_reload_fallback(&self) {
        self.reload_fallbacks.set(self.reload_fallbacks.get() + 1);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hot_updates: self.hot_updates.get() as i64,
            reload_fallbacks: self.reload_fallbacks.get() as i64,
        }
    }
}

/// Point-in-time copy of [`UpdateStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub hot_updates: i64,
    pub reload_fallbacks: i64,
}

impl StatsSnapshot {
    /// Read counters reported by another tool.
    ///
    /// Both fields must be present as numbers or as strings with a leading
    /// integer; fractional numbers are truncated.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            hot_updates: coerce_integer(object.get("hotUpdates")?)?,
            reload_fallbacks: coerce_integer(object.get("reloadFallbacks")?)?,
        })
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(text) => leading_integer(text),
        _ => None,
    }
}

/// Parse the integer prefix of `text`, ignoring leading whitespace.
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
