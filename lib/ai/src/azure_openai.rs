//! Azure OpenAI chat-completions backend.
//!
//! Talks to a chat deployment using the "functions" calling convention:
//! every registered tool is sent as a function schema with
//! `function_call: "auto"`, and the first choice of the response is turned
//! into a `ModelResponse`.

use crate::backend::{ChatBackend, ChatRequest, FunctionSchema, ModelResponse, TokenUsage};
use crate::error::LlmError;
use crate::message::Message;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PROVIDER: &str = "azure_openai";

/// Connection settings for an Azure OpenAI chat deployment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Resource API key.
    pub api_key: String,
    /// REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Name of the chat deployment.
    pub chat_deployment: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
}

fn default_api_version() -> String {
    "2023-07-01-preview".to_string()
}

impl AzureOpenAiConfig {
    /// Returns the chat-completions URL for the configured deployment.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.chat_deployment,
            self.api_version
        )
    }

    fn validate(&self) -> Result<(), LlmError> {
        let missing = [
            ("endpoint", &self.endpoint),
            ("api_key", &self.api_key),
            ("chat_deployment", &self.chat_deployment),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => Err(LlmError::InvalidConfig {
                reason: format!("{field} must not be empty"),
            }),
            None => Ok(()),
        }
    }
}

/// Chat backend for an Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAi {
    client: Client,
    config: AzureOpenAiConfig,
    url: String,
}

impl AzureOpenAi {
    /// Creates a backend with a client-side request timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a required setting is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: AzureOpenAiConfig, timeout: Duration) -> Result<Self, Report<LlmError>> {
        config.validate()?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: format!("HTTP client error: {e}"),
            })?;

        let url = config.completions_url();
        Ok(Self {
            client,
            config,
            url,
        })
    }

    fn request_body<'a>(&self, request: &'a ChatRequest) -> CompletionBody<'a> {
        CompletionBody {
            messages: &request.messages,
            function_call: (!request.functions.is_empty()).then_some("auto"),
            functions: &request.functions,
            temperature: request.temperature.unwrap_or(self.config.temperature),
        }
    }
}

#[async_trait]
impl ChatBackend for AzureOpenAi {
    #[instrument(skip(self, request), fields(deployment = %self.config.chat_deployment, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, Report<LlmError>> {
        let body = self.request_body(request);

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::ProviderUnavailable {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs }.into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "chat completion returned error");
            return Err(LlmError::RequestFailed {
                status: Some(status.as_u16()),
                reason: body,
            }
            .into());
        }

        let completion: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        Ok(completion.into_model_response()?)
    }

    fn model(&self) -> &str {
        &self.config.chat_deployment
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_functions")]
    functions: &'a [FunctionSchema],
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
    temperature: f32,
}

fn no_functions(functions: &&[FunctionSchema]) -> bool {
    functions.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl CompletionResponse {
    fn into_model_response(self) -> Result<ModelResponse, LlmError> {
        if let Some(usage) = self.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "chat completion usage"
            );
        }

        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response contained no choices".to_string(),
            })?;

        debug!(finish_reason = ?choice.finish_reason, "chat completion finished");
        ModelResponse::from_message(choice.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> AzureOpenAiConfig {
        AzureOpenAiConfig {
            endpoint: "https://example.openai.azure.com/".to_string(),
            api_key: "secret".to_string(),
            api_version: default_api_version(),
            chat_deployment: "gpt-4".to_string(),
            temperature: 0.0,
        }
    }

    #[test]
    fn completions_url_trims_trailing_slash() {
        assert_eq!(
            config().completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2023-07-01-preview"
        );
    }

    #[test]
    fn empty_api_key_is_invalid() {
        let mut cfg = config();
        cfg.api_key = " ".to_string();
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err,
            LlmError::InvalidConfig {
                reason: "api_key must not be empty".to_string()
            }
        );
    }

    #[test]
    fn body_includes_functions_and_auto_call() {
        let backend = AzureOpenAi::new(config(), Duration::from_secs(5)).expect("backend");
        let request = ChatRequest::new(vec![Message::user("What's next?")]).with_functions(vec![
            FunctionSchema {
                name: "get_next_calendar_event".to_string(),
                description: "Next event".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ]);

        let body = serde_json::to_value(backend.request_body(&request)).expect("serialize");
        assert_eq!(body["function_call"], "auto");
        assert_eq!(body["functions"][0]["name"], "get_next_calendar_event");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn body_without_functions_omits_function_fields() {
        let backend = AzureOpenAi::new(config(), Duration::from_secs(5)).expect("backend");
        let request = ChatRequest::new(vec![Message::user("hi")]).with_temperature(0.5);

        let body = serde_json::to_value(backend.request_body(&request)).expect("serialize");
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn parses_function_call_response() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "index": 0,
                "finish_reason": "function_call",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "get_calendar_events_from_today",
                        "arguments": "{}"
                    }
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
        }))
        .expect("deserialize");

        assert_eq!(
            response.into_model_response().expect("usable"),
            ModelResponse::ToolRequested {
                name: "get_calendar_events_from_today".to_string(),
                arguments: "{}".to_string(),
            }
        );
    }

    #[test]
    fn empty_choices_is_a_parse_failure() {
        let response: CompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("deserialize");
        assert!(matches!(
            response.into_model_response(),
            Err(LlmError::ResponseParseFailed { .. })
        ));
    }
}
