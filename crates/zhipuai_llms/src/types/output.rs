//! Generation results, streamed chunks and usage accounting.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;
use crate::error::Result;

/// Token counters reported by the provider, keyed by field name.
///
/// Only integer counters are kept; nested detail objects are dropped on
/// deserialization so usage from several calls can be summed key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct TokenUsage(BTreeMap<String, u64>);

impl From<BTreeMap<String, Value>> for TokenUsage {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        Self(
            raw.into_iter()
                .filter_map(|(key, value)| value.as_u64().map(|n| (key, n)))
                .collect(),
        )
    }
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a counter. Returns `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: u64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.get("prompt_tokens").unwrap_or(0)
    }

    pub fn completion_tokens(&self) -> u64 {
        self.get("completion_tokens").unwrap_or(0)
    }

    pub fn total_tokens(&self) -> u64 {
        self.get("total_tokens").unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add every counter of `other` into `self`, creating missing keys.
    ///
    /// Counters saturate at `u64::MAX`.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        for (key, value) in &other.0 {
            let total = self.0.entry(key.clone()).or_insert(0);
            *total = total.saturating_add(*value);
        }
    }
}

/// Side information about one generated message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl GenerationInfo {
    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            token_usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.token_usage = usage;
        self
    }

    /// Later values win; absent values never erase earlier ones.
    fn merge(&mut self, other: GenerationInfo) {
        if other.finish_reason.is_some() {
            self.finish_reason = other.finish_reason;
        }
        if other.token_usage.is_some() {
            self.token_usage = other.token_usage;
        }
    }
}

/// A complete generated message with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGeneration {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<GenerationInfo>,
}

impl ChatGeneration {
    pub fn new(message: Message, generation_info: Option<GenerationInfo>) -> Self {
        Self {
            message,
            generation_info,
        }
    }

    pub fn text(&self) -> &str {
        self.message.content()
    }
}

/// An incremental fragment of a streamed generation.
///
/// `generation_info` is only populated on the terminal chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGenerationChunk {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<GenerationInfo>,
}

impl ChatGenerationChunk {
    pub fn new(message: Message, generation_info: Option<GenerationInfo>) -> Self {
        Self {
            message,
            generation_info,
        }
    }

    pub fn text(&self) -> &str {
        self.message.content()
    }

    /// Append a later chunk of the same stream.
    pub fn append(&mut self, next: ChatGenerationChunk) {
        self.message.append(next.message);
        if let Some(info) = next.generation_info {
            self.generation_info
                .get_or_insert_with(GenerationInfo::default)
                .merge(info);
        }
    }
}

impl From<ChatGenerationChunk> for ChatGeneration {
    fn from(chunk: ChatGenerationChunk) -> Self {
        Self {
            message: chunk.message,
            generation_info: chunk.generation_info,
        }
    }
}

/// Aggregate side information about a whole call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmOutput {
    pub token_usage: Option<TokenUsage>,
    pub model_name: String,
}

/// Result of a chat call: one generation per returned choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub generations: Vec<ChatGeneration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<LlmOutput>,
}

impl ChatResult {
    /// Text of the first generation, if any.
    pub fn text(&self) -> Option<&str> {
        self.generations.first().map(ChatGeneration::text)
    }
}

/// Lazy, forward-only sequence of chunks produced by a streaming call.
pub struct ChatStream {
    inner: Pin<Box<dyn Stream<Item = Result<ChatGenerationChunk>> + Send>>,
}

impl ChatStream {
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<ChatGenerationChunk>> + Send>>) -> Self {
        Self { inner }
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatGenerationChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_drops_nested_details() {
        let usage: TokenUsage = serde_json::from_value(json!({
            "prompt_tokens": 12,
            "completion_tokens": 30,
            "total_tokens": 42,
            "prompt_tokens_details": { "cached_tokens": 4 }
        }))
        .unwrap();

        assert_eq!(usage.total_tokens(), 42);
        assert_eq!(usage.get("prompt_tokens_details"), None);
        assert_eq!(usage.iter().count(), 3);
    }

    #[test]
    fn test_usage_accumulate_initialises_new_keys() {
        let mut total = TokenUsage::new().with("total_tokens", 3);
        total.accumulate(&TokenUsage::new().with("total_tokens", 4).with("prompt_tokens", 1));

        assert_eq!(total.total_tokens(), 7);
        assert_eq!(total.prompt_tokens(), 1);
    }

    #[test]
    fn test_usage_accumulate_saturates() {
        let mut total = TokenUsage::new().with("total_tokens", u64::MAX - 1);
        total.accumulate(&TokenUsage::new().with("total_tokens", 10));
        assert_eq!(total.total_tokens(), u64::MAX);
    }

    #[test]
    fn test_usage_serializes_as_map() {
        let usage = TokenUsage::new().with("total_tokens", 5);
        assert_eq!(serde_json::to_value(&usage).unwrap(), json!({ "total_tokens": 5 }));
    }

    #[test]
    fn test_chunk_append_keeps_terminal_info() {
        let mut chunk = ChatGenerationChunk::new(Message::ai("a"), None);
        chunk.append(ChatGenerationChunk::new(Message::ai("b"), None));
        chunk.append(ChatGenerationChunk::new(
            Message::ai("c"),
            Some(GenerationInfo::finished("stop").with_usage(Some(
                TokenUsage::new().with("total_tokens", 9),
            ))),
        ));

        assert_eq!(chunk.text(), "abc");
        let info = chunk.generation_info.unwrap();
        assert_eq!(info.finish_reason.as_deref(), Some("stop"));
        assert_eq!(info.token_usage.unwrap().total_tokens(), 9);
    }
}
