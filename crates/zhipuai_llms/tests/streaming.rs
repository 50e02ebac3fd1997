//! Streaming tests against a mock ZhipuAI SSE endpoint.
//!
//! Run with: cargo test -p zhipuai-llms --test streaming

mod common;

use common::{bearer, sse_body, test_chat};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use zhipuai_llms::{
    CallOptions, CallbackHandler, ChatGenerationChunk, ChatModel, Error, Message,
};

fn frames() -> Vec<Value> {
    vec![
        json!({ "id": "1", "choices": [{ "index": 0, "delta": { "role": "assistant", "content": "The sky" } }] }),
        json!({ "id": "1", "choices": [] }),
        json!({ "id": "1", "choices": [{ "index": 0, "delta": { "content": " is" } }] }),
        json!({
            "id": "1",
            "choices": [{ "index": 0, "delta": { "content": " blue." }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 32, "total_tokens": 42 }
        }),
    ]
}

async fn sse_mock(server: &mut mockito::ServerGuard, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/chat/completions")
        .match_header("authorization", bearer().as_str())
        .match_body(Matcher::PartialJson(json!({ "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&frames()))
        .expect(hits)
        .create_async()
        .await
}

#[derive(Default)]
struct TokenRecorder {
    tokens: Mutex<Vec<String>>,
}

impl CallbackHandler for TokenRecorder {
    fn on_llm_new_token(&self, token: &str, _chunk: &ChatGenerationChunk) {
        self.tokens.lock().unwrap().push(token.to_string());
    }
}

#[tokio::test]
async fn test_stream_yields_chunks_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = sse_mock(&mut server, 1).await;

    let chat = test_chat(&server, 0);
    let stream = chat
        .stream(&[Message::human("What color is the sky?")], CallOptions::new())
        .await
        .unwrap();
    let chunks: Vec<_> = stream.collect().await;

    mock.assert_async().await;
    let texts: Vec<String> = chunks
        .iter()
        .map(|c| c.as_ref().unwrap().text().to_string())
        .collect();
    assert_eq!(texts, vec!["The sky", " is", " blue."]);

    let last = chunks.last().unwrap().as_ref().unwrap();
    let info = last.generation_info.as_ref().unwrap();
    assert_eq!(info.finish_reason.as_deref(), Some("stop"));
    assert!(chunks[0].as_ref().unwrap().generation_info.is_none());
}

#[tokio::test]
async fn test_streaming_generate_folds_and_backfills_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = sse_mock(&mut server, 1).await;

    let recorder = Arc::new(TokenRecorder::default());
    let chat = test_chat(&server, 0);
    let result = chat
        .generate(
            &[Message::human("What color is the sky?")],
            CallOptions::new()
                .with_stream(true)
                .with_callbacks(recorder.clone()),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.generations.len(), 1);
    assert_eq!(result.generations[0].message, Message::ai("The sky is blue."));
    assert_eq!(
        *recorder.tokens.lock().unwrap(),
        vec!["The sky", " is", " blue."]
    );

    let output = result.llm_output.unwrap();
    assert_eq!(output.model_name, "glm-4");
    assert_eq!(output.token_usage.unwrap().total_tokens(), 42);
}

#[tokio::test]
async fn test_configured_streaming_drives_generate() {
    let mut server = mockito::Server::new_async().await;
    let mock = sse_mock(&mut server, 1).await;

    let chat = zhipuai_llms::ChatZhipuAI::new(
        common::test_config(&server, 0).with_streaming(true),
    )
    .unwrap();
    let result = chat
        .generate(&[Message::human("hi")], CallOptions::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.text(), Some("The sky is blue."));
}

#[tokio::test]
async fn test_stream_open_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;

    let chat = test_chat(&server, 1);
    let err = chat
        .stream(&[Message::human("hi")], CallOptions::new())
        .await
        .err()
        .unwrap();

    mock.assert_async().await;
    assert!(matches!(err, Error::Internal { status: 503, .. }));
}

#[tokio::test]
async fn test_non_event_stream_response_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let chat = test_chat(&server, 2);
    let err = chat
        .stream(&[Message::human("hi")], CallOptions::new())
        .await
        .err()
        .unwrap();

    mock.assert_async().await;
    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_stream_without_frames_fails_to_fold() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[json!({ "choices": [] })]))
        .expect(1)
        .create_async()
        .await;

    let chat = test_chat(&server, 0);
    let err = chat
        .generate(&[Message::human("hi")], CallOptions::new().with_stream(true))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, Error::Stream(_)));
}

#[tokio::test]
async fn test_full_text_frames_fold_to_the_final_reply() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(
            json!({ "model": "charglm-3", "incremental": false, "stream": true }),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body(&[
            json!({ "choices": [{ "delta": { "role": "assistant", "content": "Hi" } }] }),
            json!({ "choices": [{ "delta": { "content": "Hi there" } }] }),
            json!({ "choices": [{ "delta": { "content": "Hi there!" }, "finish_reason": "stop" }] }),
        ]))
        .expect(1)
        .create_async()
        .await;

    let chat = zhipuai_llms::ChatZhipuAI::new(
        common::test_config(&server, 0)
            .with_model("charglm-3")
            .with_incremental(false),
    )
    .unwrap();
    let recorder = Arc::new(TokenRecorder::default());
    let result = chat
        .generate(
            &[Message::human("hi")],
            CallOptions::new()
                .with_stream(true)
                .with_callbacks(recorder.clone()),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.text(), Some("Hi there!"));
    assert_eq!(*recorder.tokens.lock().unwrap(), vec!["Hi", " there", "!"]);
}

#[tokio::test]
async fn test_connect_timeout_leaves_stream_body_unbounded() {
    let mut server = mockito::Server::new_async().await;
    let mock = sse_mock(&mut server, 1).await;

    let chat = zhipuai_llms::ChatZhipuAI::new(
        common::test_config(&server, 0).with_timeout(std::time::Duration::from_millis(200)),
    )
    .unwrap();
    assert_eq!(
        chat.config().timeout,
        Some(std::time::Duration::from_millis(200))
    );

    let stream = chat
        .stream(&[Message::human("hi")], CallOptions::new())
        .await
        .unwrap();
    let chunks: Vec<_> = stream.collect().await;

    mock.assert_async().await;
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.is_ok()));
}
