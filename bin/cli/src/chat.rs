//! Interactive terminal chat.

use crate::app::Assistant;
use crate::error::AppError;
use cxo_chat_conversation::{StatusSink, TurnState};
use cxo_chat_core::SessionId;
use rootcause::Report;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const FAILURE_NOTICE: &str = "Something went wrong while answering. Please try again.";

/// What the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Reset,
    Empty,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        "" => Input::Empty,
        text => Input::Message(text),
    }
}

/// Prints tool progress under the prompt.
struct TerminalStatus;

impl StatusSink for TerminalStatus {
    fn tool_started(&self, label: &str) {
        println!("  {label}");
    }

    fn turn_completed(&self, found: bool) {
        println!("  {}", completion_status(found));
    }
}

fn completion_status(found: bool) -> &'static str {
    if found {
        "Found relevant data."
    } else {
        "Could not find relevant data."
    }
}

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

/// Runs the chat loop until `/quit` or end of input.
///
/// # Errors
///
/// Returns `Terminal` if standard input cannot be read, or `Startup` if a
/// resumed session cannot be loaded.
pub async fn run(assistant: &Assistant, resume: Option<SessionId>) -> Result<(), Report<AppError>> {
    let mut session = match resume {
        Some(id) => assistant.resume_session(id).await?,
        None => assistant.new_session(),
    };
    println!("Session {}. Type /reset for a new session, /quit to leave.", session.id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.map_err(|_| AppError::Terminal)? else {
            break;
        };

        match classify(&line) {
            Input::Quit => break,
            Input::Empty => continue,
            Input::Reset => {
                session = assistant.new_session();
                println!("Started session {}.", session.id());
            }
            Input::Message(text) => {
                match assistant
                    .runner()
                    .run_turn(&mut session, text, &TerminalStatus)
                    .await
                {
                    Ok(outcome) => {
                        if outcome.state == TurnState::BudgetExhausted {
                            info!(session_id = %session.id(), "answered with fallback");
                        }
                        println!("assistant> {}", outcome.answer);
                        assistant.persist(&session).await;
                    }
                    Err(report) => {
                        error!(session_id = %session.id(), error = %report, "turn failed");
                        println!("assistant> {FAILURE_NOTICE}");
                    }
                }
            }
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_status_reports_whether_data_was_found() {
        assert_eq!(completion_status(true), "Found relevant data.");
        assert_eq!(completion_status(false), "Could not find relevant data.");
    }

    #[test]
    fn commands_are_recognized() {
        assert_eq!(classify("/quit"), Input::Quit);
        assert_eq!(classify("  /reset  "), Input::Reset);
        assert_eq!(classify("   "), Input::Empty);
        assert_eq!(
            classify(" What's on my calendar today? "),
            Input::Message("What's on my calendar today?")
        );
    }
}
