//! Progress notifications emitted while a chat call runs.

use crate::error::Error;
use crate::types::ChatGenerationChunk;

/// Observer for a single chat call.
///
/// Invoked synchronously and in order on the task driving the call, so
/// implementations must not block.
pub trait CallbackHandler: Send + Sync {
    /// A streamed chunk is about to be handed to the consumer.
    fn on_llm_new_token(&self, _token: &str, _chunk: &ChatGenerationChunk) {}

    /// Attempt `attempt` (1-based) failed with a retryable error and will be retried.
    fn on_retry(&self, _attempt: u32, _error: &Error) {}
}
