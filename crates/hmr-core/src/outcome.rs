//! Structured outcomes of applying an update.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Why a payload could not be hot-applied.
///
/// Every reason is terminal for the payload and leads to a full reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    /// Inbound message was not valid JSON.
    #[serde(rename = "payload.parse")]
    PayloadParse,
    /// Payload was not an object.
    #[serde(rename = "payload.invalid")]
    PayloadInvalid,
    /// Server asked for a full reload.
    #[serde(rename = "payload.requiresReload")]
    PayloadRequiresReload,
    /// A script entry had no usable URL.
    #[serde(rename = "module.invalid")]
    ModuleInvalid,
    /// A dispose handler failed.
    #[serde(rename = "module.dispose")]
    ModuleDispose,
    /// Re-importing a script failed.
    #[serde(rename = "module.import")]
    ModuleImport,
    /// An accept handler declined the new exports.
    #[serde(rename = "module.declined")]
    ModuleDeclined,
    /// A stylesheet entry had no usable URL.
    #[serde(rename = "style.invalid")]
    StyleInvalid,
    /// A replacement stylesheet failed to load.
    #[serde(rename = "style.swap")]
    StyleSwap,
    /// The runtime could not schedule work.
    #[serde(rename = "runtime.spawn")]
    RuntimeSpawn,
    /// Applying the payload crashed.
    #[serde(rename = "runtime.error")]
    RuntimeError,
}

impl FailureReason {
    /// Wire tag of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayloadParse => "payload.parse",
            Self::PayloadInvalid => "payload.invalid",
            Self::PayloadRequiresReload => "payload.requiresReload",
            Self::ModuleInvalid => "module.invalid",
            Self::ModuleDispose => "module.dispose",
            Self::ModuleImport => "module.import",
            Self::ModuleDeclined => "module.declined",
            Self::StyleInvalid => "style.invalid",
            Self::StyleSwap => "style.swap",
            Self::RuntimeSpawn => "runtime.spawn",
            Self::RuntimeError => "runtime.error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload that could not be hot-applied.
#[derive(Debug, thiserror::Error)]
#[error("hot update failed: {reason}")]
pub struct UpdateFailure {
    /// Reason tag.
    pub reason: FailureReason,
    /// Underlying error, when one was raised.
    pub error: Option<anyhow::Error>,
    /// Raw entry that caused the failure.
    pub details: Option<Value>,
}

impl UpdateFailure {
    /// Create a failure with just a reason.
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            error: None,
            details: None,
        }
    }

    /// Attach the raw entry that caused the failure.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the underlying error.
    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.error = Some(error);
        self
    }
}

impl From<FailureReason> for UpdateFailure {
    fn from(reason: FailureReason) -> Self {
        Self::new(reason)
    }
}

/// What a successfully applied payload changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The payload named no assets.
    NoChanges,
    /// At least one asset was replaced.
    Replaced,
}

/// Result of applying one payload.
pub type ApplyOutcome = Result<Applied, UpdateFailure>;

/// What the fallback observer is told.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackInfo {
    /// Reason tag.
    pub reason: FailureReason,
    /// Raw payload being applied, absent for unparseable messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Raw entry that caused the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
