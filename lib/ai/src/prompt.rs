//! System prompt for the assistant.
//!
//! The template may reference `{{today}}` and `{{weekday}}`, which are
//! substituted when the session starts so that relative dates in user
//! questions ("today", "next Monday") resolve against the real calendar.

use chrono::{DateTime, Utc};

/// Default persona used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an executive assistant with access to the \
user's calendar, email, files and a knowledge base. Use the provided functions to look up \
facts instead of guessing. Answer concisely. Today is {{weekday}}, {{today}} (UTC).";

/// A system prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    template: String,
}

impl SystemPrompt {
    /// Creates a prompt from a template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Renders the template for the given instant.
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> String {
        self.template
            .replace("{{today}}", &now.format("%Y-%m-%d").to_string())
            .replace("{{weekday}}", &now.format("%A").to_string())
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}
