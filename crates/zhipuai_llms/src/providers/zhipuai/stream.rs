//! ZhipuAI streaming support
//!
//! ZhipuAI streams server-sent events in the OpenAI-compatible shape:
//! - `data: {"choices":[{"delta":{"role":"assistant","content":"..."}}]}` for deltas
//! - `data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{...}}` to finish
//! - `data: [DONE]` to signal stream end

use std::sync::Arc;

use futures::stream::{Stream, StreamExt};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tracing::debug;

use super::convert::to_chunk;
use crate::callbacks::CallbackHandler;
use crate::error::{Error, Result};
use crate::types::{ChatStream, MessageKind};

/// How message content is spread over frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    /// Each frame carries only new text.
    #[default]
    Incremental,
    /// Each frame repeats all text generated so far (`incremental: false`).
    Cumulative,
}

impl ContentMode {
    pub fn from_incremental(incremental: Option<bool>) -> Self {
        match incremental {
            Some(false) => Self::Cumulative,
            _ => Self::Incremental,
        }
    }
}

/// Turn an opened ZhipuAI event source into a chunk stream.
///
/// The source must already have produced its `Open` event.
pub fn create_stream(
    mut event_source: EventSource,
    mode: ContentMode,
    callbacks: Option<Arc<dyn CallbackHandler>>,
) -> ChatStream {
    let frames = async_stream::stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        break;
                    }

                    match serde_json::from_str::<Value>(&message.data) {
                        Ok(frame) => yield Ok(frame),
                        Err(e) => {
                            yield Err(Error::stream_error(format!(
                                "Failed to parse ZhipuAI frame: {}", e
                            )));
                            break;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read error body".to_string());
                    yield Err(Error::from_status(status, error_body));
                    break;
                }
                Err(e) => {
                    yield Err(Error::stream_error(format!("Stream error: {}", e)));
                    break;
                }
            }
        }

        event_source.close();
    };

    decode_frames(frames, mode, callbacks)
}

/// Decode parsed frames into chunks, skipping frames without choices.
///
/// In [`ContentMode::Cumulative`] every chunk is cut down to the text not
/// seen in earlier frames, so chunks always concatenate to the full reply.
/// The handler sees every chunk before the consumer does.
pub fn decode_frames<S>(
    frames: S,
    mode: ContentMode,
    callbacks: Option<Arc<dyn CallbackHandler>>,
) -> ChatStream
where
    S: Stream<Item = Result<Value>> + Send + 'static,
{
    let stream = async_stream::stream! {
        futures::pin_mut!(frames);
        let mut current = MessageKind::Ai;
        let mut seen = String::new();

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            match to_chunk(&frame, &mut current) {
                Ok(Some(mut chunk)) => {
                    if mode == ContentMode::Cumulative && !chunk.text().is_empty() {
                        let full = chunk.message.content().to_string();
                        let fresh = full
                            .strip_prefix(seen.as_str())
                            .unwrap_or(full.as_str())
                            .to_string();
                        chunk.message.set_content(fresh);
                        seen = full;
                    }
                    if let Some(cb) = callbacks.as_deref() {
                        cb.on_llm_new_token(chunk.text(), &chunk);
                    }
                    yield Ok(chunk);
                }
                Ok(None) => debug!("Skipping ZhipuAI frame without choices"),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    ChatStream::new(Box::pin(stream))
}
