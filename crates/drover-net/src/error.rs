//! Error types for the HTTP boundary.

use thiserror::Error;

/// Errors that can occur talking to the backend.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The configured base URL is not a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The request never completed.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The backend answered with an error status.
    #[error("HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Body excerpt, if any.
        message: Option<String>,
    },

    /// The response body could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// A specialized Result type for backend operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
