//! Chat-completions message types.
//!
//! These are both the transcript entries and the wire format sent to the
//! model, so serialization follows the "functions" flavour of the chat API:
//! `content` is always present (possibly `null`), while `name` and
//! `function_call` are only emitted when set.

use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input.
    User,
    /// Model output, either an answer or a function call.
    Assistant,
    /// Result of a function the model asked for.
    Function,
    /// Instructions that frame the conversation.
    System,
}

impl Role {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Function => "function",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the requested function.
    pub name: String,
    /// Arguments as the model serialized them (JSON text).
    pub arguments: String,
}

impl FunctionCall {
    /// Creates a function call.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One transcript entry.
///
/// Use the constructors rather than building the struct by hand: they keep
/// the invariants that a function-role message always carries `name` and
/// that an assistant function call has no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// Text content; `None` while a function call is pending.
    #[serde(default)]
    pub content: Option<String>,
    /// Function the model asked for (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Function that produced the content (function messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            function_call: None,
            name: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Creates an assistant answer.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Creates the assistant message recording a function-call intent.
    #[must_use]
    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            function_call: Some(FunctionCall::new(name, arguments)),
            name: None,
        }
    }

    /// Creates the function-role message carrying a function's output.
    #[must_use]
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            function_call: None,
            name: Some(name.into()),
        }
    }

    /// Returns true if this message is a pending function call.
    #[must_use]
    pub fn is_function_call(&self) -> bool {
        self.function_call.is_some()
    }
}
