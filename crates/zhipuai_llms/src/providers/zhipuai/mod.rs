//! ZhipuAI provider module
//!
//! Implements the ChatModel trait for ZhipuAI's GLM model family.
//! API docs: https://open.bigmodel.cn/dev/api

mod async_job;
mod convert;
mod provider;
mod stream;
mod types;

pub use provider::ChatZhipuAI;
pub use types::{
    CharacterMeta, DEFAULT_BASE_URL, DEFAULT_MODEL, KNOWN_MODELS, Reference, ReturnType,
    TaskStatus, ZhipuAIConfig, ZhipuDelta, ZhipuMessage, ZhipuParams, ZhipuRequest,
    is_character_model,
};
