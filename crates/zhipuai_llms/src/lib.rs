//! zhipuai_llms: ZhipuAI (GLM) chat-model adapter with streaming support.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  ChatModelRegistry                   │
//! │  ┌──────────────────────────────────────────────┐   │
//! │  │  HashMap<String, Arc<dyn ChatModel>>          │   │
//! │  └──────────────────────────────────────────────┘   │
//! │                       │                              │
//! │                       ▼                              │
//! │   ┌──────────────────────────────────────────────┐  │
//! │   │ ChatZhipuAI                                  │  │
//! │   │  create_message_dicts ─► RetryPolicy ─► HTTP │  │
//! │   │  SSE frames ─► ChatStream ─► fold            │  │
//! │   └──────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zhipuai_llms::{CallOptions, ChatModel, ChatZhipuAI, Message};
//! use zhipuai_llms::providers::zhipuai::ZhipuAIConfig;
//!
//! # async fn run() -> zhipuai_llms::Result<()> {
//! let chat = ChatZhipuAI::new(ZhipuAIConfig::from_env().with_model("glm-4"))?;
//! let result = chat
//!     .generate(&[Message::human("Hello")], CallOptions::new())
//!     .await?;
//! println!("{}", result.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod chat_model;
pub mod error;
pub mod fold;
pub mod providers;
pub mod retry;
pub mod types;


// Re-export core abstractions
pub use callbacks::CallbackHandler;
pub use chat_model::{ChatModel, ChatModelRegistry};
pub use error::{Error, Result};
pub use fold::generate_from_stream;
pub use retry::RetryPolicy;

// Re-export provider implementations
pub use providers::ChatZhipuAI;

// Re-export commonly used types
pub use types::{
    AdditionalKwargs, CallOptions, ChatGeneration, ChatGenerationChunk, ChatResult, ChatStream,
    GenerationInfo, LlmOutput, Message, MessageKind, TokenUsage,
};
