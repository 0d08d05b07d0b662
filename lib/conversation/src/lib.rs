//! Conversation engine for cxo-chat.
//!
//! This crate provides:
//!
//! - **Transcript**: ordered message history with checkpoints
//! - **Session**: owns a transcript and talks to the chat backend
//! - **Tool Registry**: functions the model may call, and the built-in set
//! - **Turn Runner**: the bounded function-calling loop

pub mod error;
pub mod session;
pub mod tool;
pub mod tools;
pub mod transcript;
pub mod turn;

#[cfg(test)]
mod testing;

pub use cxo_chat_ai::Message;
pub use error::{SessionError, ToolError, TurnError};
pub use session::ChatSession;
pub use tool::{
    Tool, ToolCategory, ToolDefinition, ToolOutput, ToolParams, ToolRegistry, UNLABELED_STATUS,
};
pub use tools::builtin_tools;
pub use transcript::{Checkpoint, Transcript};
pub use turn::{FALLBACK_ANSWER, NoopStatus, StatusSink, TurnOutcome, TurnRunner, TurnState};
