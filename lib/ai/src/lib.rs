//! LLM primitives for cxo-chat.
//!
//! This crate provides:
//!
//! - **Messages**: the chat-completions message shape, including function calls
//! - **Backend**: the `ChatBackend` trait and the tagged `ModelResponse`
//! - **Azure OpenAI**: an HTTP implementation of the backend
//! - **Prompt**: the assistant's system prompt template

pub mod azure_openai;
pub mod backend;
pub mod error;
pub mod message;
pub mod prompt;

pub use azure_openai::{AzureOpenAi, AzureOpenAiConfig};
pub use backend::{ChatBackend, ChatRequest, FunctionSchema, ModelResponse, TokenUsage};
pub use error::LlmError;
pub use message::{FunctionCall, Message, Role};
pub use prompt::SystemPrompt;
