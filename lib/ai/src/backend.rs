//! LLM backend abstraction.
//!
//! A backend takes the whole transcript plus the function schemas and
//! returns a `ModelResponse`, which is either a finished answer or a single
//! function-call request.

use crate::error::LlmError;
use crate::message::Message;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A function the model may call, as advertised in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Function name.
    pub name: String,
    /// Natural-language description shown to the model.
    pub description: String,
    /// JSON schema of the parameters object.
    pub parameters: JsonValue,
}

/// A completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Ordered transcript.
    pub messages: Vec<Message>,
    /// Functions the model may request.
    pub functions: Vec<FunctionSchema>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Creates a request over the given transcript.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            functions: Vec::new(),
            temperature: None,
        }
    }

    /// Sets the advertised functions.
    #[must_use]
    pub fn with_functions(mut self, functions: Vec<FunctionSchema>) -> Self {
        self.functions = functions;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResponse {
    /// A final natural-language answer.
    Finished { content: String },
    /// A request to run one function.
    ToolRequested { name: String, arguments: String },
}

impl ModelResponse {
    /// Interprets an assistant message returned by the provider.
    ///
    /// A function call wins over content; a message with neither is not a
    /// usable completion.
    ///
    /// # Errors
    ///
    /// Returns `ResponseParseFailed` if the message has neither content nor
    /// a function call.
    pub fn from_message(message: Message) -> Result<Self, LlmError> {
        match (message.function_call, message.content) {
            (Some(call), _) => Ok(Self::ToolRequested {
                name: call.name,
                arguments: call.arguments,
            }),
            (None, Some(content)) => Ok(Self::Finished { content }),
            (None, None) => Err(LlmError::ResponseParseFailed {
                reason: "assistant message has neither content nor function_call".to_string(),
            }),
        }
    }

    /// Returns true if the model asked for a function.
    #[must_use]
    pub fn is_tool_request(&self) -> bool {
        matches!(self, Self::ToolRequested { .. })
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    #[serde(default, rename = "prompt_tokens")]
    pub input_tokens: u32,
    /// Completion tokens.
    #[serde(default, rename = "completion_tokens")]
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Runs one completion over the request's transcript.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable, rejects the request
    /// or answers with an unusable message. Implementations do not retry.
    async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, Report<LlmError>>;

    /// Returns the model or deployment name.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_becomes_tool_request() {
        let response =
            ModelResponse::from_message(Message::function_call("get_full_context", "{}"))
                .expect("usable");
        assert_eq!(
            response,
            ModelResponse::ToolRequested {
                name: "get_full_context".to_string(),
                arguments: "{}".to_string(),
            }
        );
        assert!(response.is_tool_request());
    }

    #[test]
    fn content_becomes_finished() {
        let response =
            ModelResponse::from_message(Message::assistant("You have two meetings.")).expect("usable");
        assert_eq!(
            response,
            ModelResponse::Finished {
                content: "You have two meetings.".to_string()
            }
        );
    }

    #[test]
    fn empty_message_is_rejected() {
        let mut msg = Message::assistant("");
        msg.content = None;
        let err = ModelResponse::from_message(msg).unwrap_err();
        assert!(matches!(err, LlmError::ResponseParseFailed { .. }));
    }

    #[test]
    fn request_builder() {
        let request = ChatRequest::new(vec![Message::user("hello")])
            .with_functions(vec![FunctionSchema {
                name: "get_next_calendar_event".to_string(),
                description: "Next event".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }])
            .with_temperature(0.0);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.functions.len(), 1);
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn token_usage_total() {
        let usage: TokenUsage =
            serde_json::from_str(r#"{"prompt_tokens": 100, "completion_tokens": 50}"#)
                .expect("deserialize");
        assert_eq!(usage.total(), 150);
    }
}
