//! ZhipuAI-specific configuration and wire types

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::retry::RetryPolicy;

/// Default API root for the v4 chat endpoints.
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "glm-4";

/// GLM models known to accept chat completions.
pub const KNOWN_MODELS: &[&str] = &[
    "glm-4",
    "glm-4-plus",
    "glm-4-air",
    "glm-4-airx",
    "glm-4-flash",
    "glm-4-long",
    "glm-4v",
    "glm-3-turbo",
    "charglm-3",
];

/// Whether `model` is a character role-play model that takes `meta`.
pub fn is_character_model(model: &str) -> bool {
    model.starts_with("charglm") || model == "characterglm"
}

/// Shape of the content returned by character models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// A standard JSON string
    #[default]
    JsonString,
    /// The raw text content
    Text,
}

/// Controls whether the provider augments the answer with external search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    #[serde(serialize_with = "bool_as_str")]
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl Reference {
    pub fn enabled(search_query: impl Into<String>) -> Self {
        Self {
            enable: true,
            search_query: Some(search_query.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enable: false,
            search_query: None,
        }
    }
}

fn bool_as_str<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

/// Persona description for character role-play models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CharacterMeta {
    pub user_info: String,
    pub bot_info: String,
    pub bot_name: String,
    pub user_name: String,
}

/// Configuration for [`ChatZhipuAI`](super::ChatZhipuAI).
#[derive(Debug)]
pub struct ZhipuAIConfig {
    /// API key; falls back to `ZHIPUAI_API_KEY` when absent
    pub api_key: Option<SecretString>,
    /// Base URL (default: https://open.bigmodel.cn/api/paas/v4/)
    pub base_url: String,
    /// Model name, e.g. `glm-4`
    pub model: String,
    /// Sampling temperature in (0, 1]
    pub temperature: f64,
    /// Nucleus sampling mass in (0, 1)
    pub top_p: f64,
    pub max_tokens: Option<u32>,
    /// Client-chosen request id; the provider generates one when absent
    pub request_id: Option<String>,
    /// Stream responses by default
    pub streaming: bool,
    /// Character models: return increments (true) or the full text so far
    pub incremental: bool,
    /// Character models: content shape
    pub return_type: ReturnType,
    /// External search augmentation directive
    pub reference: Option<Reference>,
    /// Character models: persona metadata
    pub meta: Option<CharacterMeta>,
    /// Stop sequences applied to every call
    pub stop: Option<Vec<String>>,
    /// Connect timeout; none means the client default.
    ///
    /// Reading a response body, including a long SSE stream, is not bounded.
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    /// Interval between async job polls
    pub poll_interval: Duration,
    /// Polls before an async job is abandoned
    pub max_polls: u32,
}

impl Default for ZhipuAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.95,
            top_p: 0.7,
            max_tokens: None,
            request_id: None,
            streaming: false,
            incremental: true,
            return_type: ReturnType::default(),
            reference: None,
            meta: None,
            stop: None,
            timeout: None,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(1),
            max_polls: 120,
        }
    }
}

impl ZhipuAIConfig {
    /// Create new config with API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(SecretString::from(api_key.into())),
            ..Default::default()
        }
    }

    /// Config with no key; the key is read from `ZHIPUAI_API_KEY` on construction.
    ///
    /// Optional: `ZHIPUAI_BASE_URL`, `ZHIPUAI_MODEL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("ZHIPUAI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(model) = lookup("ZHIPUAI_MODEL") {
            config.model = model;
        }

        config
    }

    /// Set base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.base_url = url;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_meta(mut self, meta: CharacterMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = Some(stop.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of retries after the first attempt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Poll every `interval`, at most `max_polls` times (must be positive)
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }
}

/// ZhipuAI chat message as sent and received on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZhipuMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// ZhipuAI streaming delta; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ZhipuDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub function_call: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl From<ZhipuMessage> for ZhipuDelta {
    fn from(msg: ZhipuMessage) -> Self {
        Self {
            role: Some(msg.role),
            content: msg.content,
            name: msg.name,
            function_call: msg.function_call,
            tool_calls: msg.tool_calls,
            tool_call_id: msg.tool_call_id,
        }
    }
}

/// Request parameters other than the messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZhipuParams {
    pub model: String,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CharacterMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<ReturnType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental: Option<bool>,
}

/// A complete chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ZhipuRequest {
    pub messages: Vec<ZhipuMessage>,
    pub params: ZhipuParams,
    /// Free-form parameters; they override same-named defaults
    pub extra: Map<String, Value>,
}

impl ZhipuRequest {
    pub fn new(messages: Vec<ZhipuMessage>, params: ZhipuParams) -> Self {
        Self {
            messages,
            params,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// JSON body: defaults, then extras, then the message list.
    pub fn to_body(&self) -> Result<Value> {
        let mut body = match serde_json::to_value(&self.params)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.extra {
            body.insert(key.clone(), value.clone());
        }
        body.insert("messages".to_string(), serde_json::to_value(&self.messages)?);
        Ok(Value::Object(body))
    }
}

/// Lifecycle of an async completion job
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Submitted, result not ready yet
    Processing,
    /// Finished with a result
    Success(crate::types::ChatResult),
    /// Finished without a result
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_defaults() {
        let config = ZhipuAIConfig::from_lookup(lookup(&[]));
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_polls, 120);
    }

    #[test]
    fn test_env_overrides_model() {
        let config = ZhipuAIConfig::from_lookup(lookup(&[("ZHIPUAI_MODEL", "glm-4-flash")]));
        assert_eq!(config.model, "glm-4-flash");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_env_base_url_gets_trailing_slash() {
        let config = ZhipuAIConfig::from_lookup(lookup(&[(
            "ZHIPUAI_BASE_URL",
            "http://localhost:8080/api/paas/v4",
        )]));
        assert_eq!(config.base_url, "http://localhost:8080/api/paas/v4/");

        let config =
            ZhipuAIConfig::from_lookup(lookup(&[("ZHIPUAI_BASE_URL", "http://proxy.local/")]));
        assert_eq!(config.base_url, "http://proxy.local/");
    }

    fn params() -> ZhipuParams {
        ZhipuParams {
            model: "glm-4".into(),
            stream: false,
            temperature: 0.95,
            top_p: 0.7,
            max_tokens: None,
            stop: None,
            request_id: None,
            reference: None,
            meta: None,
            return_type: None,
            incremental: None,
        }
    }

    #[test]
    fn test_body_omits_unset_params() {
        let body = ZhipuRequest::new(vec![], params()).to_body().unwrap();
        assert_eq!(
            body,
            json!({
                "model": "glm-4",
                "stream": false,
                "temperature": 0.95,
                "top_p": 0.7,
                "messages": []
            })
        );
    }

    #[test]
    fn test_extra_params_override_defaults() {
        let mut extra = Map::new();
        extra.insert("temperature".into(), json!(0.1));
        extra.insert("do_sample".into(), json!(false));

        let body = ZhipuRequest::new(vec![], params())
            .with_extra(extra)
            .to_body()
            .unwrap();
        assert_eq!(body["temperature"], json!(0.1));
        assert_eq!(body["do_sample"], json!(false));
    }

    #[test]
    fn test_reference_serializes_enable_as_string() {
        let value = serde_json::to_value(Reference::enabled("history")).unwrap();
        assert_eq!(value, json!({ "enable": "true", "search_query": "history" }));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ZhipuAIConfig::new("key").with_base_url("http://localhost:1234/v4");
        assert_eq!(config.base_url, "http://localhost:1234/v4/");
    }

    #[test]
    fn test_character_model_detection() {
        assert!(is_character_model("charglm-3"));
        assert!(is_character_model("characterglm"));
        assert!(!is_character_model("glm-4"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ZhipuAIConfig::new("super-secret-key");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-key"));
    }
}
