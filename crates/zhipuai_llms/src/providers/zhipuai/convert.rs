//! Conversion between generic chat types and ZhipuAI wire types

use serde_json::Value;

use super::types::{ZhipuDelta, ZhipuMessage};
use crate::error::{Error, Result};
use crate::types::{
    AdditionalKwargs, ChatGeneration, ChatGenerationChunk, ChatResult, GenerationInfo, LlmOutput,
    Message, MessageKind, TokenUsage,
};

/// Convert a generic message to its wire form
pub fn to_zhipu_message(msg: &Message) -> ZhipuMessage {
    let mut out = ZhipuMessage {
        role: msg.role().to_string(),
        content: Some(msg.content().to_string()),
        ..Default::default()
    };

    match msg {
        Message::Ai {
            content,
            additional_kwargs,
        } => {
            out.function_call = additional_kwargs.function_call.clone();
            out.tool_calls = additional_kwargs.tool_calls.clone();
            // A call-only assistant turn has no content on the wire
            if !additional_kwargs.is_empty() && content.is_empty() {
                out.content = None;
            }
        }
        Message::Function { name, .. } => out.name = Some(name.clone()),
        Message::Tool { tool_call_id, .. } => out.tool_call_id = Some(tool_call_id.clone()),
        Message::System { .. } | Message::Human { .. } | Message::Chat { .. } => {}
    }

    out
}

/// Convert a wire message (or delta) to a generic message.
///
/// The variant comes from the delta's own role when present, otherwise
/// from `fallback`.
pub fn to_message(delta: ZhipuDelta, fallback: MessageKind) -> Message {
    let kind = delta
        .role
        .as_deref()
        .map(MessageKind::from_role)
        .unwrap_or(fallback);
    let content = delta.content.unwrap_or_default();

    match kind {
        MessageKind::System => Message::System { content },
        MessageKind::Human => Message::Human { content },
        MessageKind::Ai => Message::Ai {
            content,
            additional_kwargs: AdditionalKwargs {
                function_call: delta.function_call.map(normalize_function_call),
                tool_calls: delta.tool_calls.filter(|calls| !calls.is_empty()),
            },
        },
        MessageKind::Function => Message::Function {
            content,
            name: delta.name.unwrap_or_default(),
        },
        MessageKind::Tool => Message::Tool {
            content,
            tool_call_id: delta.tool_call_id.unwrap_or_default(),
        },
        MessageKind::Chat => Message::Chat {
            content,
            role: delta.role.unwrap_or_default(),
        },
    }
}

/// Streamed function calls may carry `"name": null` after the first fragment.
fn normalize_function_call(mut call: Value) -> Value {
    if let Some(name) = call.get_mut("name") {
        if name.is_null() {
            *name = Value::String(String::new());
        }
    }
    call
}

fn parse_usage(value: Option<&Value>) -> Result<Option<TokenUsage>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(usage) => Ok(Some(serde_json::from_value(usage.clone())?)),
    }
}

/// Convert a complete chat completion response to a [`ChatResult`]
pub fn to_chat_result(response: &Value, model_name: &str) -> Result<ChatResult> {
    let choices = response
        .get("choices")
        .ok_or_else(|| Error::malformed("response has no `choices`"))?
        .as_array()
        .ok_or_else(|| Error::malformed("`choices` is not an array"))?;

    let generations = choices
        .iter()
        .map(|choice| {
            let raw = choice
                .get("message")
                .ok_or_else(|| Error::malformed("choice has no `message`"))?;
            let wire: ZhipuMessage = serde_json::from_value(raw.clone())
                .map_err(|e| Error::malformed(format!("invalid choice message: {}", e)))?;
            let kind = MessageKind::from_role(&wire.role);
            let finish_reason = choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(str::to_string);

            Ok(ChatGeneration::new(
                to_message(wire.into(), kind),
                Some(GenerationInfo {
                    finish_reason,
                    token_usage: None,
                }),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChatResult {
        generations,
        llm_output: Some(LlmOutput {
            token_usage: parse_usage(response.get("usage"))?,
            model_name: model_name.to_string(),
        }),
    })
}

/// Convert one streamed frame to a chunk.
///
/// Returns `None` for frames without choices. `current` carries the
/// message variant from one frame to the next.
pub fn to_chunk(frame: &Value, current: &mut MessageKind) -> Result<Option<ChatGenerationChunk>> {
    let choices = frame
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed("stream frame has no `choices`"))?;

    let Some(choice) = choices.first() else {
        return Ok(None);
    };

    let delta: ZhipuDelta = match choice.get("delta") {
        Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed(format!("invalid stream delta: {}", e)))?,
        _ => ZhipuDelta::default(),
    };
    let message = to_message(delta, *current);
    *current = message.kind();

    let generation_info = match choice.get("finish_reason").and_then(Value::as_str) {
        Some(reason) => {
            Some(GenerationInfo::finished(reason).with_usage(parse_usage(frame.get("usage"))?))
        }
        None => None,
    };

    Ok(Some(ChatGenerationChunk::new(message, generation_info)))
}
