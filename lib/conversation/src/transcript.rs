//! The ordered message history of a session.

use cxo_chat_ai::Message;

/// A position in a transcript to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

/// Append-only message history with rollback.
///
/// A pinned prefix (the system prompt) survives every rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    pinned: usize,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript from previously stored messages.
    ///
    /// Leading system messages are pinned.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let pinned = messages
            .iter()
            .take_while(|m| m.role == cxo_chat_ai::Role::System)
            .count();
        Self { messages, pinned }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Sets the leading system message.
    ///
    /// Replaces the first pinned system message, or pins a new one at the
    /// front if there is none.
    pub(crate) fn set_system(&mut self, message: Message) {
        match self.messages.first_mut() {
            Some(first) if self.pinned > 0 && first.role == cxo_chat_ai::Role::System => {
                *first = message;
            }
            _ => {
                self.messages.insert(0, message);
                self.pinned += 1;
            }
        }
    }

    /// Returns the current position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Drops everything appended after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.messages.truncate(checkpoint.0.max(self.pinned));
    }

    /// Returns the messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the transcript is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
