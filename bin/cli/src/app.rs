//! Wiring of clients, store and tools from configuration.

use crate::config::{AppConfig, AuthConfig};
use crate::error::AppError;
use chrono::Utc;
use cxo_chat_ai::{AzureOpenAi, ChatBackend, SystemPrompt};
use cxo_chat_conversation::{ChatSession, ToolCategory, TurnRunner, builtin_tools};
use cxo_chat_core::SessionId;
use cxo_chat_grounding::StoreGrounding;
use cxo_chat_integration::{ClientCredentials, IdentityProvider, MicrosoftGraph, StaticToken};
use cxo_chat_store::{ConversationRepository, GroundingDocumentRepository, connect};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a chat needs, built once per process.
pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
    runner: TurnRunner,
    transcripts: ConversationRepository,
    system_prompt: SystemPrompt,
}

impl Assistant {
    /// Connects to the store and builds the model and groupware clients.
    ///
    /// # Errors
    ///
    /// Returns `Startup` naming the component that failed.
    pub async fn build(config: &AppConfig) -> Result<Self, Report<AppError>> {
        let timeout = config.request_timeout();

        let identity: Arc<dyn IdentityProvider> = match &config.auth {
            AuthConfig::Static { access_token } => Arc::new(StaticToken::new(access_token.clone())),
            AuthConfig::ClientCredentials(credentials) => Arc::new(
                ClientCredentials::new(credentials.clone(), timeout)
                    .context(AppError::Startup {
                        component: "identity provider",
                    })?,
            ),
        };

        let graph = MicrosoftGraph::new(config.graph.clone(), identity, timeout).context(
            AppError::Startup {
                component: "groupware client",
            },
        )?;

        let pool = connect(&config.database).await.context(AppError::Startup {
            component: "document store",
        })?;

        let grounding = StoreGrounding::new(
            GroundingDocumentRepository::new(pool.clone()),
            config.genai.grounding_top,
        );

        let backend = AzureOpenAi::new(config.azure_openai.clone(), timeout).context(
            AppError::Startup {
                component: "chat backend",
            },
        )?;

        let registry = builtin_tools(
            Arc::new(graph),
            Arc::new(grounding),
            config.graph.default_top,
        );
        info!(
            tools = registry.len(),
            calendar_tools = registry.by_category(ToolCategory::Calendar).count(),
            max_callbacks = config.genai.max_callbacks,
            deployment = %config.azure_openai.chat_deployment,
            "assistant ready"
        );

        Ok(Self {
            backend: Arc::new(backend),
            runner: TurnRunner::new(registry, config.genai.max_callbacks),
            transcripts: ConversationRepository::new(pool),
            system_prompt: SystemPrompt::new(config.genai.system_prompt.clone()),
        })
    }

    /// Returns the turn runner.
    pub fn runner(&self) -> &TurnRunner {
        &self.runner
    }

    /// Starts a fresh session.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.backend.clone())
            .with_system_prompt(self.system_prompt.render(Utc::now()))
            .with_functions(self.runner.registry().schemas())
    }

    /// Continues a stored session, or starts it if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns `Startup` if the stored transcript cannot be read.
    pub async fn resume_session(&self, id: SessionId) -> Result<ChatSession, Report<AppError>> {
        let messages = self
            .transcripts
            .load_transcript(id)
            .await
            .context(AppError::Startup {
                component: "stored session",
            })?;
        info!(session_id = %id, messages = messages.len(), "resuming session");

        Ok(ChatSession::resume(id, self.backend.clone(), messages)
            .with_system_prompt(self.system_prompt.render(Utc::now()))
            .with_functions(self.runner.registry().schemas()))
    }

    /// Stores the session's transcript, logging instead of failing.
    pub async fn persist(&self, session: &ChatSession) {
        if let Err(report) = self
            .transcripts
            .save_transcript(session.id(), session.messages())
            .await
        {
            warn!(session_id = %session.id(), error = %report, "failed to persist transcript");
        }
    }
}
