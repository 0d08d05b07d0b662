//! Tool registry for function calling.
//!
//! Tools are the functions the model may call during a turn. The registry
//! advertises their schemas, parses the model's serialized arguments and
//! dispatches calls by name.

use crate::error::ToolError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cxo_chat_ai::FunctionSchema;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Label shown for a function without a registered label.
pub const UNLABELED_STATUS: &str = "UI for this function callback is not implemented...";

/// Parsed arguments of a tool call.
pub type ToolParams = Map<String, JsonValue>;

/// Categories of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Knowledge-base lookups.
    Grounding,
    /// Mail search.
    Email,
    /// Drive search.
    Files,
    /// Calendar queries.
    Calendar,
}

/// Definition of a tool available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON schema for the parameters object.
    pub parameters: JsonValue,
    /// Tool category.
    pub category: ToolCategory,
    /// Status line shown while the tool runs.
    pub label: String,
}

impl ToolDefinition {
    /// Creates a new tool definition without parameters.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            category,
            label: UNLABELED_STATUS.to_string(),
        }
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the status label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the schema advertised to the model.
    #[must_use]
    pub fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text, passed through.
    Text(String),
    /// Structured data, serialized as JSON text.
    Structured(JsonValue),
}

impl ToolOutput {
    /// Serializes any structured data into a structured output.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionFailed` if the value cannot be serialized.
    pub fn structured<T: Serialize>(name: &str, value: &T) -> Result<Self, Report<ToolError>> {
        serde_json::to_value(value)
            .map(Self::Structured)
            .map_err(|_| {
                ToolError::ExecutionFailed {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Returns the text handed back to the model.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Trait for tool execution.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with parsed arguments.
    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>>;
}

struct Registered {
    definition: ToolDefinition,
    tool: Box<dyn Tool>,
}

/// Registry of available tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let definition = tool.definition();
        let entry = Registered {
            definition,
            tool: Box::new(tool),
        };
        match self.index.get(&entry.definition.name) {
            Some(&position) => self.tools[position] = entry,
            None => {
                self.index
                    .insert(entry.definition.name.clone(), self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Gets a tool definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i].definition)
    }

    /// Returns all definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|r| &r.definition)
    }

    /// Returns the definitions in `category`, in registration order.
    pub fn by_category(&self, category: ToolCategory) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions().filter(move |d| d.category == category)
    }

    /// Returns the schemas to advertise to the model.
    #[must_use]
    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.definitions().map(ToolDefinition::schema).collect()
    }

    /// Returns the status label for a function name.
    #[must_use]
    pub fn status_label(&self, name: &str) -> &str {
        self.get(name)
            .map_or(UNLABELED_STATUS, |d| d.label.as_str())
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Parses serialized arguments for the named tool.
    ///
    /// Arguments must be a JSON object. An empty string is malformed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` if the name is not registered and
    /// `MalformedArguments` if `raw` is not a JSON object.
    pub fn parse_arguments(&self, name: &str, raw: &str) -> Result<ToolParams, Report<ToolError>> {
        if self.get(name).is_none() {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            }
            .into());
        }

        match serde_json::from_str::<JsonValue>(raw) {
            Ok(JsonValue::Object(params)) => Ok(params),
            Ok(other) => Err(malformed(name, format!("expected a JSON object, got {other}"))),
            Err(e) => Err(malformed(name, e.to_string())),
        }
    }

    /// Runs the named tool and returns its output as text.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` if the name is not registered, or whatever the
    /// tool itself fails with.
    #[instrument(skip(self, params))]
    pub async fn run_function(
        &self,
        name: &str,
        params: ToolParams,
    ) -> Result<String, Report<ToolError>> {
        let registered = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })?;

        let category = registered.definition.category;
        debug!(?category, "running tool");
        let output = registered.tool.execute(params).await?.into_text();
        debug!(?category, bytes = output.len(), "tool finished");
        Ok(output)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|r| &r.definition.name))
            .finish()
    }
}

fn malformed(tool: &str, reason: String) -> Report<ToolError> {
    ToolError::MalformedArguments {
        name: tool.to_string(),
        reason,
    }
    .into()
}

/// Reads a required string parameter.
pub(crate) fn required_str<'a>(
    tool: &str,
    params: &'a ToolParams,
    key: &str,
) -> Result<&'a str, Report<ToolError>> {
    match params.get(key) {
        Some(JsonValue::String(value)) => Ok(value),
        Some(other) => Err(malformed(tool, format!("'{key}' must be a string, got {other}"))),
        None => Err(malformed(tool, format!("missing required parameter '{key}'"))),
    }
}

/// Reads an optional positive integer parameter.
pub(crate) fn optional_u32(
    tool: &str,
    params: &ToolParams,
    key: &str,
) -> Result<Option<u32>, Report<ToolError>> {
    match params.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .map(Some)
            .ok_or_else(|| {
                malformed(tool, format!("'{key}' must be a positive integer, got {value}"))
            }),
    }
}

/// Reads a required RFC 3339 timestamp parameter.
pub(crate) fn required_datetime(
    tool: &str,
    params: &ToolParams,
    key: &str,
) -> Result<DateTime<Utc>, Report<ToolError>> {
    let raw = required_str(tool, params, key)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(tool, format!("'{key}' is not an RFC 3339 timestamp: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name, "Echoes its input", ToolCategory::Grounding)
                .with_label(format!("Running {}...", self.name))
        }

        async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::Structured(JsonValue::Object(params)))
        }
    }

    fn registry(calls: &Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register(Echo {
                name,
                calls: calls.clone(),
            });
        }
        registry
    }

    #[test]
    fn definitions_keep_registration_order() {
        let registry = registry(&Arc::default());
        let names: Vec<_> = registry.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        assert_eq!(registry.schemas()[1].name, "second");
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let calls = Arc::default();
        let mut registry = registry(&calls);
        registry.register(Echo {
            name: "first",
            calls,
        });
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.definitions().next().map(|d| d.name.as_str()), Some("first"));
    }

    #[test]
    fn status_label_falls_back() {
        let registry = registry(&Arc::default());
        assert_eq!(registry.status_label("second"), "Running second...");
        assert_eq!(registry.status_label("missing"), UNLABELED_STATUS);
    }

    #[test]
    fn parse_arguments_requires_object() {
        let registry = registry(&Arc::default());
        assert_eq!(
            registry.parse_arguments("first", r#"{"query":"q3"}"#).expect("object")["query"],
            "q3"
        );

        for raw in ["", "[]", "42", "\"text\"", "{not json"] {
            let err = registry.parse_arguments("first", raw).unwrap_err();
            assert!(
                matches!(err.current_context(), ToolError::MalformedArguments { .. }),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn parse_arguments_rejects_unknown_tool() {
        let registry = registry(&Arc::default());
        let err = registry.parse_arguments("missing", "{}").unwrap_err();
        assert_eq!(
            err.current_context(),
            &ToolError::UnknownTool {
                name: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn run_function_serializes_structured_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(&calls);
        let params = registry.parse_arguments("third", r#"{"n":1}"#).expect("params");

        let output = registry.run_function("third", params).await.expect("output");
        assert_eq!(output, r#"{"n":1}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_function_unknown_name_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(&calls);
        let err = registry
            .run_function("order_pizza", ToolParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), ToolError::UnknownTool { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parameter_helpers_validate_types() {
        let params = json!({"query": 7, "top": 0, "start": "yesterday"});
        let params = params.as_object().expect("object");

        assert!(required_str("t", params, "query").is_err());
        assert!(required_str("t", params, "absent").is_err());
        assert!(optional_u32("t", params, "top").is_err());
        assert_eq!(optional_u32("t", params, "absent").expect("absent ok"), None);
        assert!(required_datetime("t", params, "start").is_err());

        let params = json!({"start": "2024-03-15T09:00:00+02:00", "top": 3});
        let params = params.as_object().expect("object");
        assert_eq!(
            required_datetime("t", params, "start").expect("valid").to_rfc3339(),
            "2024-03-15T07:00:00+00:00"
        );
        assert_eq!(optional_u32("t", params, "top").expect("valid"), Some(3));
    }
}
