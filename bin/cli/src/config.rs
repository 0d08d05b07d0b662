//! Application configuration.
//!
//! Settings come from an optional YAML file overlaid with environment
//! variables prefixed `CXO`, using `__` as the nesting separator
//! (`CXO__GENAI__MAX_CALLBACKS=5`).

use crate::error::ConfigError;
use cxo_chat_ai::AzureOpenAiConfig;
use cxo_chat_ai::prompt::DEFAULT_SYSTEM_PROMPT;
use cxo_chat_integration::{ClientCredentialsConfig, GraphConfig};
use cxo_chat_store::DatabaseConfig;
use rootcause::Report;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Chat model deployment.
    pub azure_openai: AzureOpenAiConfig,

    /// Assistant behaviour.
    #[serde(default)]
    pub genai: GenAiConfig,

    /// Groupware API.
    #[serde(default)]
    pub graph: GraphConfig,

    /// How to authenticate against the groupware API.
    pub auth: AuthConfig,

    /// Document store.
    pub database: DatabaseConfig,

    /// Client-side timeout for model and groupware calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Assistant behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenAiConfig {
    /// Functions the model may run per user turn.
    #[serde(default = "default_max_callbacks")]
    pub max_callbacks: u32,

    /// System prompt template; `{{today}}` and `{{weekday}}` are filled in.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Documents included in a knowledge-base digest.
    #[serde(default = "default_grounding_top")]
    pub grounding_top: u32,
}

fn default_max_callbacks() -> u32 {
    3
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_grounding_top() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            max_callbacks: default_max_callbacks(),
            system_prompt: default_system_prompt(),
            grounding_top: default_grounding_top(),
        }
    }
}

/// Groupware authentication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AuthConfig {
    /// A pre-issued bearer token.
    Static { access_token: String },
    /// OAuth2 client-credentials grant.
    ClientCredentials(ClientCredentialsConfig),
}

fn settings(path: &Path) -> Result<config::Config, ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("CXO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ConfigError::Load {
            reason: e.to_string(),
        })
}

impl AppConfig {
    /// Loads configuration from `path` (if it exists) and the environment.
    ///
    /// # Errors
    ///
    /// Returns `Load` if a required setting is missing or malformed and
    /// `Invalid` if a setting is out of range.
    pub fn load(path: &Path) -> Result<Self, Report<ConfigError>> {
        let config: Self = settings(path)?
            .try_deserialize()
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.genai.max_callbacks < 1 {
            return Err(invalid("genai.max_callbacks", "must be at least 1"));
        }
        if self.genai.grounding_top < 1 {
            return Err(invalid("genai.grounding_top", "must be at least 1"));
        }
        if self.graph.default_top < 1 {
            return Err(invalid("graph.default_top", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

/// Loads only the database section, for commands that need nothing else.
///
/// # Errors
///
/// Returns `Load` if the section is missing or malformed.
pub fn load_database(path: &Path) -> Result<DatabaseConfig, Report<ConfigError>> {
    let database = settings(path)?
        .get::<DatabaseConfig>("database")
        .map_err(|e| ConfigError::Load {
            reason: e.to_string(),
        })?;
    Ok(database)
}
