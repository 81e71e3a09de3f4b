use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error types for imgscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server signalled throttling or blocking (HTTP 429 or 403).
    #[error("Rate limited (HTTP {status})")]
    RateLimitExceeded { status: u16 },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The extractor failed on the page content.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Catalog file missing, unreadable, or not the expected shape.
    #[error("Catalog error ({}): {message}", .path.display())]
    CatalogError { path: PathBuf, message: String },

    /// A prior result store exists but cannot be parsed.
    #[error("Result store at {} is corrupt: {source}", .path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if the server is telling us to slow down.
    ///
    /// Only explicit throttling signals qualify. Timeouts, connection resets
    /// and other HTTP failures are terminal for the target.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::RateLimitExceeded { .. })
    }

    /// Returns true if this error aborts a run rather than a single target.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::CatalogError { .. }
                | AppError::StoreCorrupt { .. }
                | AppError::IoError(_)
                | AppError::ConfigError(_)
        )
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            429 | 403 => AppError::RateLimitExceeded { status },
            _ => AppError::HttpError(format!("HTTP {status} for {url}")),
        }
    }
}
