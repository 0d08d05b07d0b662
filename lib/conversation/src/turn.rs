//! The function-calling loop for one user turn.
//!
//! ```text
//! AwaitingModel ──answer──▶ Finished
//!      │  ▲
//! tool │  │ result fed back
//!      ▼  │
//! ToolRequested ──budget spent──▶ BudgetExhausted
//! ```
//!
//! Each cycle runs exactly one function. The loop knows nothing about the
//! terminal or any other UI; progress is reported through a [`StatusSink`].

use crate::error::{SessionError, ToolError, TurnError};
use crate::session::ChatSession;
use crate::tool::ToolRegistry;
use cxo_chat_ai::ModelResponse;
use rootcause::Report;
use tracing::{debug, info, warn};

/// Answer presented when the model keeps asking for tools past the budget.
pub const FALLBACK_ANSWER: &str = "Sorry, I could not find relevant data";

/// Where a turn is in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for the model to respond.
    AwaitingModel,
    /// The model asked for a function.
    ToolRequested,
    /// The model produced an answer.
    Finished,
    /// The model still wanted tools after the last allowed callback.
    BudgetExhausted,
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text to show the user.
    pub answer: String,
    /// Terminal state: `Finished` or `BudgetExhausted`.
    pub state: TurnState,
    /// Number of functions run.
    pub callbacks: u32,
}

/// Observer of turn progress.
pub trait StatusSink: Send + Sync {
    /// A function is about to run.
    fn tool_started(&self, label: &str);

    /// The turn ended; `found` is false when the budget ran out.
    fn turn_completed(&self, found: bool);
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn tool_started(&self, _label: &str) {}

    fn turn_completed(&self, _found: bool) {}
}

/// Drives the call, execute and feed-back cycle.
#[derive(Debug)]
pub struct TurnRunner {
    registry: ToolRegistry,
    max_callbacks: u32,
}

impl TurnRunner {
    /// Creates a runner allowing at most `max_callbacks` functions per turn.
    #[must_use]
    pub fn new(registry: ToolRegistry, max_callbacks: u32) -> Self {
        Self {
            registry,
            max_callbacks,
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns the callback budget.
    #[must_use]
    pub fn max_callbacks(&self) -> u32 {
        self.max_callbacks
    }

    /// Runs one user turn to completion.
    ///
    /// # Errors
    ///
    /// Returns a `TurnError` if the model or a tool fails. The session's
    /// transcript is rolled back to where the failed cycle began; a failure
    /// of the first model call also removes the user message.
    pub async fn run_turn(
        &self,
        session: &mut ChatSession,
        user_message: &str,
        status: &dyn StatusSink,
    ) -> Result<TurnOutcome, Report<TurnError>> {
        let session_id = session.id();
        let turn_start = session.checkpoint();
        let mut state = TurnState::AwaitingModel;
        debug!(%session_id, ?state, "turn started");

        let mut response = match session.run(user_message).await {
            Ok(response) => response,
            Err(report) => {
                session.rollback(turn_start);
                return Err(model_unavailable(report));
            }
        };

        let mut callbacks = 0;
        loop {
            let (name, arguments) = match response {
                ModelResponse::Finished { content } => {
                    state = TurnState::Finished;
                    debug!(%session_id, ?state, callbacks, "turn finished");
                    session.record_answer(&content);
                    status.turn_completed(true);
                    return Ok(TurnOutcome {
                        answer: content,
                        state,
                        callbacks,
                    });
                }
                ModelResponse::ToolRequested { name, arguments } => (name, arguments),
            };

            if callbacks >= self.max_callbacks {
                state = TurnState::BudgetExhausted;
                warn!(%session_id, ?state, tool = %name, callbacks, "callback budget exhausted");
                session.record_answer(FALLBACK_ANSWER);
                status.turn_completed(false);
                return Ok(TurnOutcome {
                    answer: FALLBACK_ANSWER.to_string(),
                    state,
                    callbacks,
                });
            }

            state = TurnState::ToolRequested;
            let cycle_start = session.checkpoint();
            callbacks += 1;
            info!(%session_id, ?state, tool = %name, callback = callbacks, "running tool");
            status.tool_started(self.registry.status_label(&name));

            let result = match self.invoke(&name, &arguments).await {
                Ok(result) => result,
                Err(report) => {
                    session.rollback(cycle_start);
                    return Err(report);
                }
            };
            session.record_tool_exchange(&name, &arguments, &result);

            state = TurnState::AwaitingModel;
            debug!(%session_id, ?state, "feeding tool result back");
            response = match session.call_llm().await {
                Ok(response) => response,
                Err(report) => {
                    session.rollback(cycle_start);
                    return Err(model_unavailable(report));
                }
            };
        }
    }

    async fn invoke(&self, name: &str, arguments: &str) -> Result<String, Report<TurnError>> {
        let params = self
            .registry
            .parse_arguments(name, arguments)
            .map_err(tool_failure)?;
        self.registry
            .run_function(name, params)
            .await
            .map_err(tool_failure)
    }
}

fn model_unavailable(report: Report<SessionError>) -> Report<TurnError> {
    report.context(TurnError::ModelUnavailable)
}

fn tool_failure(report: Report<ToolError>) -> Report<TurnError> {
    let context = TurnError::from(report.current_context());
    report.context(context)
}
