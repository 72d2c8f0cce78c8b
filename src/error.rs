// src/error.rs

//! Unified error handling for the tourlist pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Page or API request failed (non-2xx or network failure)
    #[error("Fetch error for {url} (status {status:?}): {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Request did not complete within its timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Listing markup no longer matches the expected shape
    #[error("Parse error: {message} (near: {fragment:?})")]
    Parse { message: String, fragment: String },

    /// Staging row carries a date that cannot be parsed
    #[error("Invalid show date in row {row}: {text:?}")]
    DateParse { row: u64, text: String },

    /// Two concert rows derived the same surrogate key
    #[error("Surrogate key collision on show_key {key}")]
    KeyCollision { key: u64 },

    /// Artist has no match in the catalog
    #[error("Artist not found in catalog: {0}")]
    ArtistNotFound(String),

    /// Catalog credential missing, expired or rejected
    #[error("Authorization error: {0}")]
    Auth(String),

    /// Catalog asked us to slow down
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Publish aborted because the listing shrank too much
    #[error(
        "Circuit breaker triggered: {previous_count} -> {current_count} {measure} ({drop_percent:.1}% drop > {threshold_percent}%)"
    )]
    CircuitBreakerTriggered {
        /// `rows` or `artists`
        measure: &'static str,
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// Listing produced no rows while the previous run had some
    #[error("Extraction produced an empty listing")]
    EmptyListing,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error.
    pub fn fetch(url: impl Into<String>, status: Option<u16>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            message: message.to_string(),
        }
    }

    /// Create a parse error carrying the offending fragment.
    pub fn parse(message: impl Into<String>, fragment: impl AsRef<str>) -> Self {
        let fragment: String = fragment.as_ref().chars().take(200).collect();
        Self::Parse {
            message: message.into(),
            fragment,
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create an authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failed operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Server-mandated delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::fetch("http://x", None, "connection reset").is_transient());
        assert!(AppError::fetch("http://x", Some(503), "unavailable").is_transient());
        assert!(!AppError::fetch("http://x", Some(404), "missing").is_transient());
        assert!(AppError::Timeout("fetch".into()).is_transient());
        assert!(AppError::RateLimited { retry_after_secs: 2 }.is_transient());
        assert!(!AppError::auth("expired").is_transient());
        assert!(!AppError::parse("no container", "<html>").is_transient());
    }

    #[test]
    fn test_retry_after() {
        let err = AppError::RateLimited { retry_after_secs: 7 };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(AppError::Timeout("x".into()).retry_after(), None);
    }

    #[test]
    fn test_parse_fragment_is_truncated() {
        let long = "x".repeat(500);
        match AppError::parse("bad", &long) {
            AppError::Parse { fragment, .. } => assert_eq!(fragment.len(), 200),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
