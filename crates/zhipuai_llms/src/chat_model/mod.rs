//! Chat-model trait and registry

mod trait_def;

pub use trait_def::ChatModel;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Registry of chat models, keyed by ID.
#[derive(Default, Clone)]
pub struct ChatModelRegistry {
    models: HashMap<String, Arc<dyn ChatModel>>,
}

impl ChatModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under the given ID. Returns `self` for chaining.
    pub fn register<M: ChatModel + 'static>(mut self, id: impl Into<String>, model: M) -> Self {
        self.models.insert(id.into(), Arc::new(model));
        self
    }

    /// Look up a model by ID.
    pub fn get_model(&self, id: &str) -> Result<Arc<dyn ChatModel>> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ModelNotFound(id.to_string()))
    }

    /// List all registered model IDs.
    pub fn list_models(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}
