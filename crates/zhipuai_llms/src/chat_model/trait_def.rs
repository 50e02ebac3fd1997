use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{CallOptions, ChatResult, ChatStream, LlmOutput, Message};

/// Uniform interface every chat-model adapter implements.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short identifier of the adapter type, e.g. `"zhipuai-chat"`.
    fn llm_type(&self) -> &str;

    /// Parameters that identify this model instance (for caching and tracing).
    fn identifying_params(&self) -> Value;

    /// Run a chat call to completion.
    async fn generate(&self, messages: &[Message], options: CallOptions) -> Result<ChatResult>;

    /// Run a chat call and yield chunks as they arrive.
    async fn stream(&self, messages: &[Message], options: CallOptions) -> Result<ChatStream>;

    /// Merge the output metadata of several calls into one.
    fn combine_llm_outputs(&self, outputs: &[Option<LlmOutput>]) -> LlmOutput;
}
