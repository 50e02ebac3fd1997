//! Provider-neutral types shared by every chat model.

mod message;
mod output;
mod request;

pub use message::{AdditionalKwargs, Message, MessageKind};
pub use output::{
    ChatGeneration, ChatGenerationChunk, ChatResult, ChatStream, GenerationInfo, LlmOutput,
    TokenUsage,
};
pub use request::CallOptions;
