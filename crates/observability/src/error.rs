//! Error types for the observability crate

use thiserror::Error;

/// Errors raised while installing the tracing subscriber
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// The subscriber or OTLP exporter could not be set up
    #[error("Failed to initialize observability: {0}")]
    InitFailed(String),

    /// The configuration could not be applied (e.g. a bad log filter)
    #[error("Configuration error: {0}")]
    Config(String),
}
