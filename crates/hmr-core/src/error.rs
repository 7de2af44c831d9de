//! Runtime error types.

/// Errors raised outside the per-payload apply path.
#[derive(Debug, thiserror::Error)]
pub enum HmrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Marker storage error: {0}")]
    Storage(String),

    #[error("Platform unavailable: {0}")]
    Platform(String),
}
