//! Persisted chat transcripts.
//!
//! A session's transcript is stored as numbered rows in `chat_messages`.
//! Saving replaces the stored rows wholesale, so a transcript that was
//! rolled back in memory is rolled back on disk at the next save.

use crate::error::StoreError;
use chrono::Utc;
use cxo_chat_ai::{FunctionCall, Message, Role};
use cxo_chat_core::{MessageId, SessionId};
use rootcause::Report;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

#[derive(FromRow)]
struct MessageRow {
    role: String,
    content: Option<String>,
    name: Option<String>,
    function_name: Option<String>,
    function_arguments: Option<String>,
}

impl MessageRow {
    fn from_message(message: &Message) -> Self {
        let (function_name, function_arguments) = match &message.function_call {
            Some(call) => (Some(call.name.clone()), Some(call.arguments.clone())),
            None => (None, None),
        };
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            name: message.name.clone(),
            function_name,
            function_arguments,
        }
    }

    fn try_into_message(self) -> Result<Message, StoreError> {
        let role = parse_role(&self.role)?;
        let function_call = match (self.function_name, self.function_arguments) {
            (Some(name), arguments) => Some(FunctionCall::new(name, arguments.unwrap_or_default())),
            (None, _) => None,
        };

        Ok(Message {
            role,
            content: self.content,
            function_call,
            name: self.name,
        })
    }
}

fn parse_role(value: &str) -> Result<Role, StoreError> {
    match value {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "function" => Ok(Role::Function),
        "system" => Ok(Role::System),
        other => Err(StoreError::InvalidRow {
            reason: format!("unknown role '{other}'"),
        }),
    }
}

/// Repository for chat sessions and their messages.
#[derive(Debug, Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores the full transcript of a session.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if any statement fails; nothing is written in
    /// that case.
    #[instrument(skip(self, messages), fields(session_id = %session_id, messages = messages.len()))]
    pub async fn save_transcript(
        &self,
        session_id: SessionId,
        messages: &[Message],
    ) -> Result<(), Report<StoreError>> {
        let session = session_id.to_string();
        let mut tx = self.pool.begin().await.map_err(StoreError::query)?;

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (id, created_at, updated_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&session)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::query)?;

        sqlx::query("DELETE FROM chat_messages WHERE session_id = $1")
            .bind(&session)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query)?;

        for (position, message) in messages.iter().enumerate() {
            let row = MessageRow::from_message(message);
            let position = i32::try_from(position).map_err(|_| StoreError::InvalidRow {
                reason: "transcript too long".to_string(),
            })?;
            sqlx::query(
                r#"
                INSERT INTO chat_messages
                    (id, session_id, position, role, content, name, function_name, function_arguments)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(MessageId::new().to_string())
            .bind(&session)
            .bind(position)
            .bind(&row.role)
            .bind(&row.content)
            .bind(&row.name)
            .bind(&row.function_name)
            .bind(&row.function_arguments)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query)?;
        }

        tx.commit().await.map_err(StoreError::query)?;
        debug!("transcript saved");
        Ok(())
    }

    /// Loads a session's transcript in order.
    ///
    /// An unknown session yields an empty transcript.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` or `InvalidRow`.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn load_transcript(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Message>, Report<StoreError>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT role, content, name, function_name, function_arguments
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query)?;

        let messages = rows
            .into_iter()
            .map(MessageRow::try_into_message)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}
