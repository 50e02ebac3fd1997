//! Per-call options passed to a chat model.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::callbacks::CallbackHandler;

/// Options for a single `generate` / `stream` call.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Stop sequences; providers may keep only a prefix of this list
    pub stop: Option<Vec<String>>,
    /// Overrides the model's configured streaming flag
    pub stream: Option<bool>,
    /// Receives per-token and per-retry notifications
    pub callbacks: Option<Arc<dyn CallbackHandler>>,
    /// Extra provider parameters, merged over the defaults
    pub extra: Map<String, Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = Some(stop.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("stop", &self.stop)
            .field("stream", &self.stream)
            .field("callbacks", &self.callbacks.as_ref().map(|_| "Some(CallbackHandler)"))
            .field("extra", &self.extra)
            .finish()
    }
}
