//! ZhipuAI chat model implementation

use super::convert::{to_chat_result, to_zhipu_message};
use super::stream::{ContentMode, create_stream};
use super::types::{
    KNOWN_MODELS, ZhipuAIConfig, ZhipuMessage, ZhipuParams, ZhipuRequest, is_character_model,
};
use crate::callbacks::CallbackHandler;
use crate::chat_model::ChatModel;
use crate::error::{Error, Result};
use crate::fold::generate_from_stream;
use crate::types::{CallOptions, ChatResult, ChatStream, LlmOutput, Message, TokenUsage};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

/// ZhipuAI (GLM) chat model
pub struct ChatZhipuAI {
    config: ZhipuAIConfig,
    api_key: SecretString,
    client: Client,
}

impl ChatZhipuAI {
    /// Environment variable for API key
    pub const API_KEY_ENV: &'static str = "ZHIPUAI_API_KEY";

    /// Create a new ZhipuAI chat model.
    ///
    /// The key comes from the config, then from `ZHIPUAI_API_KEY`.
    pub fn new(mut config: ZhipuAIConfig) -> Result<Self> {
        let api_key = resolve_api_key(
            config.api_key.take(),
            std::env::var(Self::API_KEY_ENV).ok(),
        )?;
        validate(&config)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Create model from environment
    pub fn from_env() -> Result<Self> {
        Self::new(ZhipuAIConfig::from_env())
    }

    pub fn config(&self) -> &ZhipuAIConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    /// GLM models known to accept chat completions (ZhipuAI has no models endpoint)
    pub fn list_models(&self) -> Vec<String> {
        KNOWN_MODELS.iter().map(|m| m.to_string()).collect()
    }

    /// Parameters sent with every request before per-call overrides
    pub fn default_params(&self) -> ZhipuParams {
        let config = &self.config;
        let character = is_character_model(&config.model);

        ZhipuParams {
            model: config.model.clone(),
            stream: config.streaming,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            stop: config.stop.clone().filter(|s| !s.is_empty()),
            request_id: config.request_id.clone(),
            reference: config.reference.clone(),
            meta: config.meta.clone().filter(|_| character),
            return_type: character.then_some(config.return_type),
            incremental: character.then_some(config.incremental),
        }
    }

    /// Serialize messages and assemble request parameters.
    ///
    /// A per-call stop list conflicts with a configured one. Only the first
    /// stop sequence is sent.
    pub fn create_message_dicts(
        &self,
        messages: &[Message],
        stop: Option<&[String]>,
    ) -> Result<(Vec<ZhipuMessage>, ZhipuParams)> {
        let mut params = self.default_params();

        if let Some(stop) = stop.filter(|s| !s.is_empty()) {
            if params.stop.is_some() {
                return Err(Error::config(
                    "`stop` found in both the input and default params",
                ));
            }
            params.stop = Some(stop.to_vec());
        }
        if let Some(stop) = params.stop.as_mut() {
            stop.truncate(1);
        }

        let dicts = messages.iter().map(to_zhipu_message).collect();
        Ok((dicts, params))
    }

    /// Convert a raw completion response to a [`ChatResult`]
    pub fn create_chat_result(&self, response: &Value) -> Result<ChatResult> {
        to_chat_result(response, &self.config.model)
    }

    /// Build a request for `messages`; `stream` always wins over extras.
    pub(super) fn build_request(
        &self,
        messages: &[Message],
        options: &CallOptions,
        stream: bool,
    ) -> Result<ZhipuRequest> {
        let (dicts, mut params) = self.create_message_dicts(messages, options.stop.as_deref())?;
        params.stream = stream;

        let mut extra = options.extra.clone();
        extra.remove("stream");

        Ok(ZhipuRequest::new(dicts, params).with_extra(extra))
    }

    pub(super) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// POST a JSON body and parse the JSON answer
    pub(super) async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// GET a URL and parse the JSON answer
    pub(super) async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        read_json(response).await
    }

    /// Send a non-streaming completion request under the retry policy
    pub async fn completion_with_retry(
        &self,
        request: &ZhipuRequest,
        callbacks: Option<&dyn CallbackHandler>,
    ) -> Result<Value> {
        let url = self.endpoint("chat/completions");
        let body = request.to_body()?;
        debug!(
            model = %request.params.model,
            messages = request.messages.len(),
            "Sending ZhipuAI completion request"
        );

        let (url, body) = (url.as_str(), &body);
        self.config
            .retry
            .run(callbacks, move || self.post_json(url, body))
            .await
    }

    /// Open a streaming request under the retry policy
    pub async fn stream_with_retry(
        &self,
        request: &ZhipuRequest,
        callbacks: Option<Arc<dyn CallbackHandler>>,
    ) -> Result<ChatStream> {
        let url = self.endpoint("chat/completions");
        let mut body = request.to_body()?;
        body["stream"] = Value::Bool(true);
        debug!(
            model = %request.params.model,
            messages = request.messages.len(),
            "Opening ZhipuAI stream"
        );

        let event_source = {
            let (url, body) = (url.as_str(), &body);
            self.config
                .retry
                .run(callbacks.as_deref(), move || self.open_event_source(url, body))
                .await?
        };

        let mode = ContentMode::from_incremental(request.params.incremental);
        Ok(create_stream(event_source, mode, callbacks))
    }

    /// Connect and wait for the stream to open, so status errors surface here
    async fn open_event_source(&self, url: &str, body: &Value) -> Result<EventSource> {
        let req_builder = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body);

        let mut event_source = EventSource::new(req_builder)
            .map_err(|e| Error::stream_error(format!("Failed to create event source: {}", e)))?;
        event_source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        match event_source.next().await {
            Some(Ok(Event::Open)) => Ok(event_source),
            Some(Ok(Event::Message(_))) => {
                event_source.close();
                Err(Error::stream_error("Stream produced data before opening"))
            }
            Some(Err(err)) => {
                event_source.close();
                Err(open_error(err).await)
            }
            None => Err(Error::provider_error("Stream closed before opening")),
        }
    }
}

fn resolve_api_key(explicit: Option<SecretString>, env: Option<String>) -> Result<SecretString> {
    explicit
        .filter(|key| !key.expose_secret().is_empty())
        .or_else(|| env.filter(|key| !key.is_empty()).map(SecretString::from))
        .ok_or_else(|| Error::MissingApiKey("zhipuai".to_string()))
}

fn validate(config: &ZhipuAIConfig) -> Result<()> {
    if !(config.temperature > 0.0 && config.temperature <= 1.0) {
        return Err(Error::config(format!(
            "temperature must be in (0, 1], got {}",
            config.temperature
        )));
    }
    if !(config.top_p > 0.0 && config.top_p < 1.0) {
        return Err(Error::config(format!(
            "top_p must be in (0, 1), got {}",
            config.top_p
        )));
    }
    if config.max_tokens == Some(0) {
        return Err(Error::config("max_tokens must be positive"));
    }
    if config.max_polls == 0 {
        return Err(Error::config("max_polls must be positive"));
    }
    Ok(())
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::from_status(status, error_text));
    }

    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| Error::malformed(format!("Invalid JSON response: {}", e)))
}

async fn open_error(err: reqwest_eventsource::Error) -> Error {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Error::from_status(status, error_body)
        }
        reqwest_eventsource::Error::InvalidContentType(content_type, _) => Error::malformed(
            format!("Expected an event stream, got content type {:?}", content_type),
        ),
        reqwest_eventsource::Error::Transport(e) => Error::from(e),
        e => Error::provider_error(format!("Failed to open stream: {}", e)),
    }
}

#[async_trait]
impl ChatModel for ChatZhipuAI {
    fn llm_type(&self) -> &str {
        "zhipuai-chat"
    }

    fn identifying_params(&self) -> Value {
        json!({ "model_name": self.config.model })
    }

    async fn generate(&self, messages: &[Message], options: CallOptions) -> Result<ChatResult> {
        let should_stream = options.stream.unwrap_or(self.config.streaming);
        let span = info_span!(
            "zhipuai.generate",
            model = %self.config.model,
            stream = should_stream
        );

        async move {
            let request = self.build_request(messages, &options, should_stream)?;

            if should_stream {
                let stream = self
                    .stream_with_retry(&request, options.callbacks.clone())
                    .await?;
                let mut result = generate_from_stream(stream).await?;

                let token_usage = result
                    .generations
                    .last()
                    .and_then(|g| g.generation_info.as_ref())
                    .and_then(|info| info.token_usage.clone());
                result.llm_output = Some(LlmOutput {
                    token_usage,
                    model_name: self.config.model.clone(),
                });
                return Ok(result);
            }

            let response = self
                .completion_with_retry(&request, options.callbacks.as_deref())
                .await?;
            self.create_chat_result(&response)
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, messages: &[Message], options: CallOptions) -> Result<ChatStream> {
        let span = info_span!("zhipuai.stream", model = %self.config.model);

        async move {
            let request = self.build_request(messages, &options, true)?;
            self.stream_with_retry(&request, options.callbacks.clone())
                .await
        }
        .instrument(span)
        .await
    }

    fn combine_llm_outputs(&self, outputs: &[Option<LlmOutput>]) -> LlmOutput {
        let mut overall = TokenUsage::new();
        for output in outputs.iter().flatten() {
            if let Some(usage) = &output.token_usage {
                overall.accumulate(usage);
            }
        }

        LlmOutput {
            token_usage: Some(overall),
            model_name: self.config.model.clone(),
        }
    }
}
