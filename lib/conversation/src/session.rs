//! Conversation sessions.
//!
//! A session owns the transcript and is its only writer. It sends the
//! transcript, together with the advertised function schemas, to the chat
//! backend and hands the tagged response back to the caller.

use crate::error::SessionError;
use crate::transcript::{Checkpoint, Transcript};
use cxo_chat_ai::{ChatBackend, ChatRequest, FunctionSchema, Message, ModelResponse};
use cxo_chat_core::SessionId;
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A single conversation with the model.
pub struct ChatSession {
    id: SessionId,
    backend: Arc<dyn ChatBackend>,
    functions: Vec<FunctionSchema>,
    transcript: Transcript,
}

impl ChatSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            id: SessionId::new(),
            backend,
            functions: Vec::new(),
            transcript: Transcript::new(),
        }
    }

    /// Continues a stored session.
    #[must_use]
    pub fn resume(id: SessionId, backend: Arc<dyn ChatBackend>, messages: Vec<Message>) -> Self {
        Self {
            id,
            backend,
            functions: Vec::new(),
            transcript: Transcript::from_messages(messages),
        }
    }

    /// Opens the transcript with a system prompt.
    ///
    /// On a resumed session this replaces the stored prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.refresh_system_prompt(prompt);
        self
    }

    /// Replaces the system prompt, keeping the rest of the history.
    pub fn refresh_system_prompt(&mut self, prompt: impl Into<String>) {
        self.transcript.set_system(Message::system(prompt));
    }

    /// Sets the functions advertised to the model.
    #[must_use]
    pub fn with_functions(mut self, functions: Vec<FunctionSchema>) -> Self {
        self.functions = functions;
        self
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the transcript in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// Returns the current transcript position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.transcript.checkpoint()
    }

    /// Undoes everything appended since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let before = self.transcript.len();
        self.transcript.rollback(checkpoint);
        debug!(
            session_id = %self.id,
            dropped = before - self.transcript.len(),
            "transcript rolled back"
        );
    }

    /// Appends the user's message and asks the model for a response.
    ///
    /// The user message stays in the transcript even if the call fails.
    ///
    /// # Errors
    ///
    /// Returns `ModelUnavailable` if the completion call fails.
    pub async fn run(
        &mut self,
        user_message: &str,
    ) -> Result<ModelResponse, Report<SessionError>> {
        self.transcript.push(Message::user(user_message));
        self.call_llm().await
    }

    /// Asks the model for a response to the current transcript.
    ///
    /// # Errors
    ///
    /// Returns `ModelUnavailable` if the completion call fails.
    #[instrument(skip(self), fields(session_id = %self.id, messages = self.transcript.len()))]
    pub async fn call_llm(&self) -> Result<ModelResponse, Report<SessionError>> {
        let request = ChatRequest::new(self.transcript.messages().to_vec())
            .with_functions(self.functions.clone());

        let response = self
            .backend
            .complete(&request)
            .await
            .context(SessionError::ModelUnavailable {
                model: self.backend.model().to_string(),
            })?;

        debug!(tool_requested = response.is_tool_request(), "model responded");
        Ok(response)
    }

    /// Records a completed function call: the assistant's request followed
    /// by the function's result.
    pub fn record_tool_exchange(&mut self, name: &str, arguments: &str, result: &str) {
        self.transcript.push(Message::function_call(name, arguments));
        self.transcript.push(Message::function_result(name, result));
    }

    /// Records the assistant's final answer.
    pub fn record_answer(&mut self, content: &str) {
        self.transcript.push(Message::assistant(content));
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("model", &self.backend.model())
            .field("functions", &self.functions.len())
            .field("transcript", &self.transcript)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use cxo_chat_ai::{LlmError, Role};

    #[tokio::test]
    async fn run_sends_transcript_and_functions() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(ModelResponse::Finished {
            content: "Hi there".to_string(),
        })]));
        let mut session = ChatSession::new(backend.clone())
            .with_system_prompt("persona")
            .with_functions(vec![FunctionSchema {
                name: "get_next_calendar_event".to_string(),
                description: "Next event".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }]);

        let response = session.run("Hello").await.expect("response");
        assert_eq!(
            response,
            ModelResponse::Finished {
                content: "Hi there".to_string()
            }
        );

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1], Message::user("Hello"));
        assert_eq!(requests[0].functions.len(), 1);
    }

    #[tokio::test]
    async fn call_llm_does_not_touch_transcript() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(ModelResponse::Finished {
            content: "ok".to_string(),
        })]));
        let session = ChatSession::new(backend);
        session.call_llm().await.expect("response");
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_model_unavailable() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(LlmError::Timeout)]));
        let mut session = ChatSession::new(backend);

        let err = session.run("Hello").await.unwrap_err();
        assert_eq!(
            err.current_context(),
            &SessionError::ModelUnavailable {
                model: "scripted".to_string()
            }
        );
    }

    #[test]
    fn tool_exchange_is_call_then_result() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let mut session = ChatSession::new(backend);
        session.record_tool_exchange("get_full_context", r#"{"query":"q3"}"#, "digest");

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_function_call());
        assert_eq!(messages[0].content, None);
        assert_eq!(messages[1].role, Role::Function);
        assert_eq!(messages[1].name.as_deref(), Some("get_full_context"));
    }

    #[test]
    fn resumed_session_gets_current_system_prompt() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let session = ChatSession::resume(
            SessionId::new(),
            backend,
            vec![
                Message::system("Today is Monday, 2024-03-11 (UTC)."),
                Message::user("What is on my calendar?"),
                Message::assistant("Nothing today."),
            ],
        )
        .with_system_prompt("Today is Friday, 2024-03-15 (UTC).");

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0].content.as_deref(),
            Some("Today is Friday, 2024-03-15 (UTC).")
        );
        assert_eq!(messages[1], Message::user("What is on my calendar?"));
    }

    #[test]
    fn refresh_keeps_a_single_system_prompt() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let mut session = ChatSession::new(backend).with_system_prompt("first");
        session.record_answer("hello");
        session.refresh_system_prompt("second");

        assert_eq!(
            session.messages(),
            &[Message::system("second"), Message::assistant("hello")]
        );
    }

    #[test]
    fn system_prompt_survives_rollback() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let mut session = ChatSession::new(backend).with_system_prompt("persona");
        let start = session.checkpoint();
        session.record_answer("stray");
        session.rollback(start);
        assert_eq!(session.messages(), &[Message::system("persona")]);
    }
}
