//! Common test utilities backed by a local mockito server.

use mockito::ServerGuard;
use serde_json::Value;
use std::time::Duration;
use zhipuai_llms::providers::zhipuai::ZhipuAIConfig;
use zhipuai_llms::{ChatZhipuAI, RetryPolicy};

/// API key the mock server expects.
pub const API_KEY: &str = "test-key";

/// Config pointed at the mock server, with zero backoff.
pub fn test_config(server: &ServerGuard, max_retries: u32) -> ZhipuAIConfig {
    ZhipuAIConfig::new(API_KEY)
        .with_base_url(server.url())
        .with_retry(RetryPolicy::new(max_retries).with_backoff(Duration::ZERO, Duration::ZERO))
}

/// Chat model pointed at the mock server.
#[allow(dead_code)]
pub fn test_chat(server: &ServerGuard, max_retries: u32) -> ChatZhipuAI {
    ChatZhipuAI::new(test_config(server, max_retries)).unwrap()
}

/// Encode frames as an SSE body terminated by `[DONE]`.
#[allow(dead_code)]
pub fn sse_body(frames: &[Value]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {}\n\n", frame));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Authorization header value the mock server expects.
pub fn bearer() -> String {
    format!("Bearer {}", API_KEY)
}
