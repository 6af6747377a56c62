use std::fmt;
use std::io;

/// Error returned when a formatter or client is built from invalid
/// settings. Raised before any event is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` must not be empty or whitespace")]
    Blank(&'static str),

    #[error("`{0}` contains characters that are not allowed in an HTTP header")]
    InvalidHeader(&'static str),
}

/// Fault raised while rendering a single event.
///
/// These never escape [`EventFormatter::format`](crate::formatter::EventFormatter::format);
/// the event is dropped and the error is reported through self-diagnostics.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to render value: {0}")]
    Render(#[from] fmt::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write formatted event: {0}")]
    Io(#[from] io::Error),
}

/// Error returned by [`DynatraceHttpClient::post`](crate::http::DynatraceHttpClient::post).
#[cfg(feature = "http")]
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request URI must not be empty or whitespace")]
    InvalidUri,

    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Check that a required setting is present and not just whitespace.
pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Blank(field))
    } else {
        Ok(())
    }
}
