//! Error types for the search library.

use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("HTTP {status} for {url}")]
    Transport { url: String, status: u16 },

    /// The provider served an anti-bot challenge instead of results.
    #[error("Blocked by provider: {0}")]
    Blocked(String),

    /// The local outbound budget for this key is exhausted.
    #[error("Rate limit exceeded for key {key}")]
    RateExceeded { key: String },

    /// No preset is registered under this name.
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The embedding capability failed or returned malformed vectors.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No engines configured.
    #[error("No search engines configured")]
    NoEngines,

    /// Every engine of an aggregation failed.
    #[error("All engines failed: {0}")]
    AllEnginesFailed(String),

    /// Search timeout exceeded.
    #[error("Search timeout exceeded")]
    Timeout,

    /// I/O error (proxy list files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Returns whether a retry could plausibly succeed.
    ///
    /// Local policy decisions and caller mistakes are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SearchError::RateExceeded { .. }
                | SearchError::UnknownPreset(_)
                | SearchError::InvalidQuery(_)
                | SearchError::NoEngines
                | SearchError::Parse(_)
        )
    }

    /// Returns whether this is an anti-bot block.
    pub fn is_blocked(&self) -> bool {
        matches!(self, SearchError::Blocked(_))
    }
}
