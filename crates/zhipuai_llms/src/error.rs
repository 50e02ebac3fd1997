//! Error types for chat-model operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while configuring or calling a chat model.
#[derive(Debug, Error)]
pub enum Error {
    /// No API key was supplied and none was found in the environment
    #[error("Missing API key for provider '{0}'")]
    MissingApiKey(String),

    /// Invalid or conflicting configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request timed out before the provider answered
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The provider rejected the request (HTTP 400 and other client errors)
    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// The provider rejected the credentials (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The account hit a rate or quota limit (HTTP 429)
    #[error("Rate limit reached: {0}")]
    RateLimited(String),

    /// The provider failed internally (HTTP 5xx)
    #[error("Provider internal error ({status}): {message}")]
    Internal { status: u16, message: String },

    /// Any other provider or transport failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// The response did not have the expected structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A stream broke after it was opened
    #[error("Stream error: {0}")]
    Stream(String),

    /// No model registered under the requested id
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn provider_error(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn stream_error(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Map a non-success HTTP status and its body to an error kind.
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let message = body.into();
        match status.as_u16() {
            401 | 403 => Self::Authentication(message),
            429 => Self::RateLimited(message),
            408 => Self::Timeout(message),
            code @ 400..=499 => Self::RequestFailed {
                status: code,
                message,
            },
            code @ 500..=599 => Self::Internal {
                status: code,
                message,
            },
            code => Self::Provider(format!("unexpected status {}: {}", code, message)),
        }
    }

    /// Whether the retry policy should try the call again.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Provider(_)
                | Self::RequestFailed { .. }
                | Self::RateLimited(_)
                | Self::Internal { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status, err.to_string()),
            None => Self::Provider(err.to_string()),
        }
    }
}

/// Result type for chat-model operations.
pub type Result<T> = std::result::Result<T, Error>;
