//! Utility functions for tracing

/// Create a span for a chat-model call
///
/// Latency and token fields start empty; fill them with
/// [`record_duration`](crate::record_duration) and `Span::record`.
///
/// # Example
///
/// ```rust
/// use zhipuai_observability::chat_span;
///
/// let span = chat_span!("zhipuai-chat", "glm-4", "generate");
/// let _guard = span.enter();
/// // ... chat call ...
/// ```
#[macro_export]
macro_rules! chat_span {
    ($llm_type:expr, $model:expr, $operation:expr) => {
        tracing::info_span!(
            "chat.call",
            llm.type = $llm_type,
            llm.model = $model,
            operation = $operation,
            llm.total_tokens = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Create a span for a CLI command
///
/// # Example
///
/// ```rust
/// use zhipuai_observability::command_span;
///
/// let span = command_span!("models");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! command_span {
    ($command:expr) => {
        tracing::info_span!("cli.command", command = $command)
    };
}

/// Record an error on the current span
///
/// Records an error flag and message on the current span and emits an
/// error event.
///
/// # Example
///
/// ```rust
/// use zhipuai_observability::record_error;
///
/// let err = std::io::Error::other("connection reset");
/// record_error(&err);
/// ```
pub fn record_error<E: std::error::Error>(error: &E) {
    let span = tracing::Span::current();
    span.record("error", true);
    span.record("error.message", error.to_string());
    tracing::error!(error = %error, "Operation failed");
}

/// Record latency/duration on the current span
///
/// # Example
///
/// ```rust
/// use zhipuai_observability::record_duration;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... operation ...
/// record_duration("duration_ms", start.elapsed());
/// ```
pub fn record_duration(key: &str, duration: std::time::Duration) {
    let span = tracing::Span::current();
    span.record(key, duration.as_millis() as u64);
}
