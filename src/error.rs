//! Catalog cache error types

use std::time::Duration;

/// Catalog cache error types.
///
/// `Clone` so that a single upstream failure can be handed to every caller
/// coalesced onto the same in-flight fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    // Upstream errors (recovered locally via the durable tier)
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse upstream response: {0}")]
    Parse(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    // Data errors
    #[error("invalid catalog data: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("I/O error: {0}")]
    Io(String),

    // Configuration errors
    /// No fetch strategy is registered for the requested provider.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CatalogError {
    /// Whether this error came from talking to a provider.
    ///
    /// Upstream failures (including timeouts) are absorbed by falling back to
    /// the last known-good snapshot; everything else is a local problem.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) | Self::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Json(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured bound
            CatalogError::Http(format!("request timed out: {err}"))
        } else if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else {
            CatalogError::Http(err.to_string())
        }
    }
}

/// Result type alias for catalog cache operations
pub type Result<T> = std::result::Result<T, CatalogError>;
