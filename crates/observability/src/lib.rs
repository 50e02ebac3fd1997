//! ZhipuAI Observability - tracing setup for the ZhipuAI chat tools
//!
//! This crate provides OpenTelemetry tracing setup and span helpers shared
//! by the `zhipuai` binary and anything else embedding the chat adapter.
//!
//! # Features
//!
//! - OpenTelemetry integration with OTLP export
//! - Configurable via environment variables or programmatic API
//! - Span helpers for chat-model calls
//! - Console logging on stderr
//!
//! # Quick Start
//!
//! ```no_run
//! use zhipuai_observability::{ObservabilityConfig, init};
//!
//! # fn main() -> Result<(), zhipuai_observability::ObservabilityError> {
//! // Initialize with configuration
//! let config = ObservabilityConfig::new("zhipuai-cli")
//!     .with_otlp_endpoint("http://localhost:4317")
//!     .with_log_level("info");
//!
//! init(config)?;
//!
//! // Use tracing as usual
//! tracing::info!("Service started");
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME` or `SERVICE_NAME` - Service name
//! - `OTEL_SERVICE_VERSION` or `SERVICE_VERSION` - Service version
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - OTLP endpoint
//! - `OTEL_LOG_LEVEL` or `RUST_LOG` - Log level filter

pub mod config;
pub mod error;
pub mod telemetry;
pub mod tracing;

pub use config::ObservabilityConfig;
pub use error::ObservabilityError;
pub use telemetry::{init, init_from_env, shutdown};
pub use tracing::{record_duration, record_error};

// Macros are exported via #[macro_export] and available
// as zhipuai_observability::chat_span!(), etc.
