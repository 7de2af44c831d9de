//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HmrError;

/// Configuration for the hot-update client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmrConfig {
    /// Origin that relative asset URLs resolve against.
    pub origin: String,
    /// Server-push endpoint.
    pub event_source_url: String,
    /// Name of the server event carrying update payloads.
    pub event_name: String,
    /// Query parameter used for cache-busting.
    pub cache_bust_param: String,
    /// Session storage key for the reload diagnostic marker.
    pub marker_key: String,
    /// Status message shown while falling back to a reload.
    pub fallback_message: String,
    /// How long to wait for a replacement stylesheet before treating the
    /// swap as done.
    pub style_settle_timeout_ms: u64,
    /// Upper bound for accept/dispose handlers. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_timeout_ms: Option<u64>,
}

impl Default for HmrConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost".to_string(),
            event_source_url: "/sse".to_string(),
            event_name: "hmr".to_string(),
            cache_bust_param: "hmr".to_string(),
            marker_key: "hmr:last-reload".to_string(),
            fallback_message: "Hot update fallback – reloading…".to_string(),
            style_settle_timeout_ms: 5_000,
            handler_timeout_ms: None,
        }
    }
}

impl HmrConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the marker storage key.
    pub fn with_marker_key(mut self, key: impl Into<String>) -> Self {
        self.marker_key = key.into();
        self
    }

    /// Set the stylesheet settle timeout.
    pub fn with_style_settle_timeout(mut self, timeout: Duration) -> Self {
        self.style_settle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Bound accept/dispose handlers.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Stylesheet settle timeout.
    pub fn style_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.style_settle_timeout_ms)
    }

    /// Handler timeout, if bounded.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    /// Parsed page origin.
    pub fn origin_url(&self) -> Result<Url, HmrError> {
        Url::parse(&self.origin)
            .map_err(|e| HmrError::Config(format!("invalid origin '{}': {}", self.origin, e)))
    }

    /// Check the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), HmrError> {
        self.origin_url()?;

        if self.event_name.trim().is_empty() {
            return Err(HmrError::Config("event_name must not be empty".to_string()));
        }
        if self.cache_bust_param.trim().is_empty() {
            return Err(HmrError::Config(
                "cache_bust_param must not be empty".to_string(),
            ));
        }
        if self.marker_key.is_empty() {
            return Err(HmrError::Config("marker_key must not be empty".to_string()));
        }

        Ok(())
    }

    /// Parse a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, HmrError> {
        let config: Self =
            toml::from_str(content).map_err(|e| HmrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration.
    pub fn from_json_str(content: &str) -> Result<Self, HmrError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| HmrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, JSON if the path ends in `.json`, TOML
    /// otherwise.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &str) -> Result<Self, HmrError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HmrError::Config(format!("failed to read {}: {}", path, e)))?;

        if path.ends_with(".json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, HmrError> {
        toml::to_string_pretty(self).map_err(|e| HmrError::Config(e.to_string()))
    }
}
