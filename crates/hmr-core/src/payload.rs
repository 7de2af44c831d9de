//! Update payloads and changed assets.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a changed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// A script module.
    Js,
    /// A stylesheet.
    Css,
    /// Any other kind the build server reports.
    #[serde(other)]
    Other,
}

impl AssetKind {
    fn parse(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("js") => Self::Js,
            Some("css") => Self::Css,
            _ => Self::Other,
        }
    }
}

/// One changed resource named by a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Asset kind.
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// URL the page loads the asset from. Never empty.
    pub url: String,
    /// Path relative to the project root, for diagnostics.
    #[serde(default)]
    pub relative_path: String,
}

impl Asset {
    /// Create a script asset.
    pub fn js(url: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Js,
            url: url.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Create a stylesheet asset.
    pub fn css(url: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Css,
            url: url.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Validate a raw payload entry.
    ///
    /// Only the URL is checked: it must be a non-empty string. Returns `None`
    /// for anything else, which aborts the whole payload.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let url = object.get("url")?.as_str()?;
        if url.is_empty() {
            return None;
        }

        Some(Self {
            kind: AssetKind::parse(object.get("type")),
            url: url.to_string(),
            relative_path: object
                .get("relativePath")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Encode as a raw payload entry.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative_path.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{}", self.relative_path)
        }
    }
}

/// Decoded view of one build-server notification.
///
/// Entries in `modules` and `styles` stay raw so that an invalid entry can be
/// reported at its position without rejecting the rest of the decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    /// Human-readable origin of the change.
    pub changed_file: Option<String>,
    /// Scripts to hot-replace, in application order.
    pub modules: Vec<Value>,
    /// Stylesheets to hot-replace, in application order.
    pub styles: Vec<Value>,
    /// Server-asserted escape hatch: skip hot-apply entirely.
    pub requires_reload: bool,
    /// Diagnostic hints forwarded on fallback.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_reasons: Vec<String>,
}

impl UpdatePayload {
    /// Create an empty payload for a changed file.
    pub fn new(changed_file: impl Into<String>) -> Self {
        Self {
            changed_file: Some(changed_file.into()),
            ..Default::default()
        }
    }

    /// Decode a raw payload leniently.
    ///
    /// Returns `None` only when the value is not an object. Non-array asset
    /// lists become empty, a non-string `changedFile` is dropped, and only a
    /// literal `true` sets `requiresReload`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        Some(Self {
            changed_file: object
                .get("changedFile")
                .and_then(Value::as_str)
                .map(String::from),
            modules: array_or_empty(object.get("modules")),
            styles: array_or_empty(object.get("styles")),
            requires_reload: matches!(object.get("requiresReload"), Some(Value::Bool(true))),
            fallback_reasons: fallback_reasons(value),
        })
    }

    /// Append a script asset.
    pub fn with_module(mut self, asset: Asset) -> Self {
        self.modules.push(asset.to_value());
        self
    }

    /// Append a stylesheet asset.
    pub fn with_style(mut self, asset: Asset) -> Self {
        self.styles.push(asset.to_value());
        self
    }

    /// Whether the payload names no assets at all.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.styles.is_empty()
    }

    /// Encode as the wire representation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `changedFile` of a raw payload, if it is a string.
pub fn changed_file(payload: Option<&Value>) -> Option<&str> {
    payload?.get("changedFile")?.as_str()
}

/// `fallbackReasons` of a raw payload, skipping non-string entries.
pub fn fallback_reasons(payload: &Value) -> Vec<String> {
    payload
        .get("fallbackReasons")
        .and_then(Value::as_array)
        .map(|reasons| {
            reasons
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn array_or_empty(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_from_value() {
        let asset = Asset::from_value(&json!({
            "type": "js",
            "url": "/pages/home/index.js",
            "relativePath": "index.js"
        }))
        .unwrap();

        assert_eq!(asset.kind, AssetKind::Js);
        assert_eq!(asset.url, "/pages/home/index.js");
        assert_eq!(asset.relative_path, "index.js");
    }

    #[test]
    fn test_asset_requires_non_empty_url() {
        assert!(Asset::from_value(&json!({"type": "js", "url": ""})).is_none());
        assert!(Asset::from_value(&json!({"type": "js", "url": 42})).is_none());
        assert!(Asset::from_value(&json!({"type": "js"})).is_none());
        assert!(Asset::from_value(&json!("/app.js")).is_none());
        assert!(Asset::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_asset_kind_is_not_validated() {
        let asset = Asset::from_value(&json!({"type": "wasm", "url": "/a.wasm"})).unwrap();
        assert_eq!(asset.kind, AssetKind::Other);
        assert_eq!(asset.relative_path, "");
    }

    #[test]
    fn test_asset_display_prefers_relative_path() {
        assert_eq!(Asset::js("/a.js", "src/a.ts").to_string(), "src/a.ts");
        assert_eq!(Asset::js("/a.js", "").to_string(), "/a.js");
    }

    #[test]
    fn test_payload_rejects_non_objects() {
        assert!(UpdatePayload::from_value(&json!(null)).is_none());
        assert!(UpdatePayload::from_value(&json!([1, 2])).is_none());
        assert!(UpdatePayload::from_value(&json!("reload")).is_none());
    }

    #[test]
    fn test_payload_is_lenient() {
        let payload = UpdatePayload::from_value(&json!({
            "changedFile": 7,
            "modules": "not-a-list",
            "styles": null,
            "requiresReload": "yes",
            "fallbackReasons": ["a", 1, "b"]
        }))
        .unwrap();

        assert_eq!(payload.changed_file, None);
        assert!(payload.is_empty());
        assert!(!payload.requires_reload);
        assert_eq!(payload.fallback_reasons, vec!["a", "b"]);
    }

    #[test]
    fn test_payload_builder_wire_format() {
        let payload = UpdatePayload::new("src/app.ts")
            .with_module(Asset::js("/app.js", "app.js"))
            .with_style(Asset::css("/app.css", "app.css"));
        let value = payload.to_value();

        assert_eq!(value["changedFile"], "src/app.ts");
        assert_eq!(value["modules"][0]["type"], "js");
        assert_eq!(value["modules"][0]["relativePath"], "app.js");
        assert_eq!(value["styles"][0]["url"], "/app.css");
        assert_eq!(value["requiresReload"], false);
        assert!(value.get("fallbackReasons").is_none());
        assert_eq!(UpdatePayload::from_value(&value).unwrap(), payload);
    }
}
