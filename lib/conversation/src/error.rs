//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ToolError`: resolving, parsing and running a tool
//! - `SessionError`: completion calls made by a session
//! - `TurnError`: what a caller of the function-calling loop sees

use std::fmt;

/// Errors from tool resolution and execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered.
    UnknownTool { name: String },
    /// The arguments are not a JSON object or do not fit the tool.
    MalformedArguments { name: String, reason: String },
    /// The tool's backing service failed.
    ExecutionFailed { name: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "unknown tool: {name}"),
            Self::MalformedArguments { name, reason } => {
                write!(f, "malformed arguments for tool '{name}': {reason}")
            }
            Self::ExecutionFailed { name } => write!(f, "tool '{name}' execution failed"),
        }
    }
}

impl std::error::Error for ToolError {}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The completion call failed or returned nothing usable.
    ModelUnavailable { model: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelUnavailable { model } => write!(f, "model '{model}' unavailable"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors that abort a user turn.
///
/// Running out of callbacks is not an error; see `TurnState::BudgetExhausted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The model asked for a function that is not registered.
    UnknownTool { name: String },
    /// The model's arguments could not be used.
    MalformedArguments { name: String },
    /// The model could not be reached or answered unusably.
    ModelUnavailable,
    /// A tool's backing service failed or timed out.
    ToolFailed { name: String },
}

impl From<&ToolError> for TurnError {
    fn from(error: &ToolError) -> Self {
        match error {
            ToolError::UnknownTool { name } => Self::UnknownTool { name: name.clone() },
            ToolError::MalformedArguments { name, .. } => {
                Self::MalformedArguments { name: name.clone() }
            }
            ToolError::ExecutionFailed { name } => Self::ToolFailed { name: name.clone() },
        }
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "model requested unknown tool '{name}'"),
            Self::MalformedArguments { name } => {
                write!(f, "model sent malformed arguments for '{name}'")
            }
            Self::ModelUnavailable => write!(f, "model unavailable"),
            Self::ToolFailed { name } => write!(f, "tool '{name}' failed"),
        }
    }
}

impl std::error::Error for TurnError {}
