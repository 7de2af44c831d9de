//! Status reporting to the development indicator.

use std::fmt;

/// Statuses understood by the development indicator.
///
/// Only `HmrFallback` is raised by the update runtime; the rest belong to
/// the transport lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevStatus {
    Connected,
    Disconnected,
    Building,
    Success,
    Error,
    HmrFallback,
}

impl DevStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Building => "building",
            Self::Success => "success",
            Self::Error => "error",
            Self::HmrFallback => "hmr-fallback",
        }
    }
}

impl fmt::Display for DevStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives status changes for the development indicator.
pub trait StatusSink {
    /// Show a status, optionally with a message.
    fn set_status(&self, status: DevStatus, message: Option<&str>) -> anyhow::Result<()>;
}

impl<F> StatusSink for F
where
    F: Fn(DevStatus, Option<&str>) -> anyhow::Result<()>,
{
    fn set_status(&self, status: DevStatus, message: Option<&str>) -> anyhow::Result<()> {
        self(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_status_names() {
        assert_eq!(DevStatus::HmrFallback.as_str(), "hmr-fallback");
        assert_eq!(DevStatus::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |status: DevStatus, message: Option<&str>| -> anyhow::Result<()> {
            seen.borrow_mut()
                .push(format!("{}:{}", status, message.unwrap_or("")));
            Ok(())
        };

        sink.set_status(DevStatus::HmrFallback, Some("reloading")).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["hmr-fallback:reloading"]);
    }
}
