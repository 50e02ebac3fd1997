//! Chat messages exchanged with a chat model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The variant a message belongs to, without its payload.
///
/// Used as the carry-over accumulator while a stream is being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    System,
    Human,
    #[default]
    Ai,
    Function,
    Tool,
    Chat,
}

impl MessageKind {
    /// Select a variant from a wire role. Unknown roles become [`MessageKind::Chat`].
    pub fn from_role(role: &str) -> Self {
        match role {
            "system" => Self::System,
            "user" => Self::Human,
            "assistant" => Self::Ai,
            "function" => Self::Function,
            "tool" => Self::Tool,
            _ => Self::Chat,
        }
    }
}

/// Side payloads an assistant message may carry, kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalKwargs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

impl AdditionalKwargs {
    pub fn is_empty(&self) -> bool {
        self.function_call.is_none() && self.tool_calls.is_none()
    }

    /// Fold a streamed fragment into the accumulated payloads.
    pub fn merge(&mut self, other: AdditionalKwargs) {
        if let Some(fragment) = other.function_call {
            match self.function_call.as_mut() {
                Some(current) => merge_json(current, fragment),
                None => self.function_call = Some(fragment),
            }
        }

        if let Some(fragments) = other.tool_calls {
            let calls = self.tool_calls.get_or_insert_with(Vec::new);
            for fragment in fragments {
                let position = fragment
                    .get("index")
                    .and_then(|idx| calls.iter().position(|c| c.get("index") == Some(idx)));
                match position {
                    Some(i) => merge_json(&mut calls[i], fragment),
                    None => calls.push(fragment),
                }
            }
        }
    }
}

/// Keys whose first non-empty value wins instead of being concatenated.
const IDENTITY_KEYS: &[&str] = &["id", "index", "type"];

fn merge_json(target: &mut Value, fragment: Value) {
    if target.is_null() {
        *target = fragment;
        return;
    }

    let (Value::Object(left), Value::Object(right)) = (target, fragment) else {
        return;
    };

    for (key, value) in right {
        match left.get_mut(&key) {
            None => {
                left.insert(key, value);
            }
            Some(slot) if slot.is_null() => *slot = value,
            Some(Value::String(existing)) => {
                if let Value::String(more) = value {
                    if IDENTITY_KEYS.contains(&key.as_str()) {
                        if existing.is_empty() {
                            *existing = more;
                        }
                    } else {
                        existing.push_str(&more);
                    }
                }
            }
            Some(slot) => merge_json(slot, value),
        }
    }
}

/// A single conversation turn, tagged by speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "AdditionalKwargs::is_empty")]
        additional_kwargs: AdditionalKwargs,
    },
    Function {
        content: String,
        name: String,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
    Chat {
        content: String,
        role: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            additional_kwargs: AdditionalKwargs::default(),
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Function {
            content: content.into(),
            name: name.into(),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn chat(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Chat {
            content: content.into(),
            role: role.into(),
        }
    }

    /// Attach a function-call payload. No-op on non-assistant messages.
    pub fn with_function_call(mut self, function_call: Value) -> Self {
        if let Self::Ai {
            additional_kwargs, ..
        } = &mut self
        {
            additional_kwargs.function_call = Some(function_call);
        }
        self
    }

    /// Attach tool-call payloads. No-op on non-assistant messages.
    pub fn with_tool_calls(mut self, tool_calls: Vec<Value>) -> Self {
        if let Self::Ai {
            additional_kwargs, ..
        } = &mut self
        {
            additional_kwargs.tool_calls = Some(tool_calls);
        }
        self
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::System { .. } => MessageKind::System,
            Self::Human { .. } => MessageKind::Human,
            Self::Ai { .. } => MessageKind::Ai,
            Self::Function { .. } => MessageKind::Function,
            Self::Tool { .. } => MessageKind::Tool,
            Self::Chat { .. } => MessageKind::Chat,
        }
    }

    /// Wire role for this message.
    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "user",
            Self::Ai { .. } => "assistant",
            Self::Function { .. } => "function",
            Self::Tool { .. } => "tool",
            Self::Chat { role, .. } => role,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Ai { content, .. }
            | Self::Function { content, .. }
            | Self::Tool { content, .. }
            | Self::Chat { content, .. } => content,
        }
    }

    /// Replace the text content, keeping variant and call payloads.
    pub fn set_content(&mut self, content: impl Into<String>) {
        *self.content_mut() = content.into();
    }

    fn content_mut(&mut self) -> &mut String {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Ai { content, .. }
            | Self::Function { content, .. }
            | Self::Tool { content, .. }
            | Self::Chat { content, .. } => content,
        }
    }

    pub fn additional_kwargs(&self) -> Option<&AdditionalKwargs> {
        match self {
            Self::Ai {
                additional_kwargs, ..
            } => Some(additional_kwargs),
            _ => None,
        }
    }

    /// Append a streamed fragment to this message.
    ///
    /// Content is concatenated, call payloads are merged, and empty
    /// identity fields (function name, tool call id, chat role) are filled
    /// from the fragment. The variant of `self` is kept.
    pub fn append(&mut self, fragment: Message) {
        self.content_mut().push_str(fragment.content());

        match (self, fragment) {
            (
                Self::Ai {
                    additional_kwargs, ..
                },
                Self::Ai {
                    additional_kwargs: more,
                    ..
                },
            ) => additional_kwargs.merge(more),
            (Self::Function { name, .. }, Self::Function { name: more, .. })
                if name.is_empty() =>
            {
                *name = more
            }
            (
                Self::Tool { tool_call_id, .. },
                Self::Tool {
                    tool_call_id: more,
                    ..
                },
            ) if tool_call_id.is_empty() => *tool_call_id = more,
            (Self::Chat { role, .. }, Self::Chat { role: more, .. }) if role.is_empty() => {
                *role = more
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_role() {
        assert_eq!(MessageKind::from_role("system"), MessageKind::System);
        assert_eq!(MessageKind::from_role("user"), MessageKind::Human);
        assert_eq!(MessageKind::from_role("assistant"), MessageKind::Ai);
        assert_eq!(MessageKind::from_role("function"), MessageKind::Function);
        assert_eq!(MessageKind::from_role("tool"), MessageKind::Tool);
        assert_eq!(MessageKind::from_role("narrator"), MessageKind::Chat);
    }

    #[test]
    fn test_append_concatenates_content() {
        let mut msg = Message::ai("Hel");
        msg.append(Message::ai("lo"));
        assert_eq!(msg.content(), "Hello");
        assert_eq!(msg.kind(), MessageKind::Ai);
    }

    #[test]
    fn test_append_merges_function_call_arguments() {
        let mut msg = Message::ai("").with_function_call(json!({
            "name": "get_weather",
            "arguments": "{\"city\":"
        }));
        msg.append(Message::ai("").with_function_call(json!({
            "name": "",
            "arguments": "\"Beijing\"}"
        })));

        let call = msg
            .additional_kwargs()
            .and_then(|k| k.function_call.as_ref())
            .unwrap();
        assert_eq!(call["name"], "get_weather");
        assert_eq!(call["arguments"], "{\"city\":\"Beijing\"}");
    }

    #[test]
    fn test_append_merges_tool_calls_by_index() {
        let mut msg = Message::ai("").with_tool_calls(vec![json!({
            "index": 0,
            "id": "call_1",
            "type": "function",
            "function": { "name": "search", "arguments": "{\"q\":" }
        })]);
        msg.append(Message::ai("").with_tool_calls(vec![json!({
            "index": 0,
            "function": { "arguments": "\"rust\"}" }
        })]));
        msg.append(Message::ai("").with_tool_calls(vec![json!({
            "index": 1,
            "id": "call_2",
            "type": "function",
            "function": { "name": "noop", "arguments": "{}" }
        })]));

        let calls = msg
            .additional_kwargs()
            .and_then(|k| k.tool_calls.as_ref())
            .unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["id"], "call_1");
        assert_eq!(calls[0]["function"]["arguments"], "{\"q\":\"rust\"}");
        assert_eq!(calls[1]["id"], "call_2");
    }

    #[test]
    fn test_append_fills_missing_tool_call_id() {
        let mut msg = Message::tool("", "par");
        msg.append(Message::tool("call_9", "tial"));
        assert_eq!(msg, Message::tool("call_9", "partial"));
    }

    #[test]
    fn test_with_function_call_ignored_on_human() {
        let msg = Message::human("hi").with_function_call(json!({"name": "x"}));
        assert!(msg.additional_kwargs().is_none());
    }
}
