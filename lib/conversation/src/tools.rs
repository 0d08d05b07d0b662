//! Built-in tools backed by the groupware service and grounding.

use crate::error::ToolError;
use crate::tool::{
    Tool, ToolCategory, ToolDefinition, ToolOutput, ToolParams, ToolRegistry, optional_u32,
    required_datetime, required_str,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cxo_chat_grounding::GroundingProvider;
use cxo_chat_integration::GroupwareService;
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde_json::json;
use std::sync::Arc;

/// Knowledge-base digest for a query.
pub const GET_FULL_CONTEXT: &str = "get_full_context";
/// Mail search.
pub const GET_EMAIL_CONTEXT: &str = "get_email_context";
/// Drive file search.
pub const GET_FILE_CONTEXT: &str = "get_file_context";
/// Calendar events between two timestamps.
pub const GET_CALENDAR_EVENTS_IN_PERIOD: &str = "get_calendar_events_in_period";
/// The first event after now.
pub const GET_NEXT_CALENDAR_EVENT: &str = "get_next_calendar_event";
/// Events for the current UTC day.
pub const GET_CALENDAR_EVENTS_FROM_TODAY: &str = "get_calendar_events_from_today";
/// Calendar events whose subject contains a query.
pub const SEARCH_CALENDAR_EVENT: &str = "search_calendar_event";

/// Builds a registry holding every built-in tool.
///
/// `default_top` bounds mail and file searches when the model does not
/// pass `top`.
#[must_use]
pub fn builtin_tools(
    groupware: Arc<dyn GroupwareService>,
    grounding: Arc<dyn GroundingProvider>,
    default_top: u32,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FullContext { grounding });
    registry.register(EmailContext {
        groupware: groupware.clone(),
        default_top,
    });
    registry.register(FileContext {
        groupware: groupware.clone(),
        default_top,
    });
    registry.register(CalendarEventsInPeriod {
        groupware: groupware.clone(),
    });
    registry.register(NextCalendarEvent {
        groupware: groupware.clone(),
    });
    registry.register(CalendarEventsToday {
        groupware: groupware.clone(),
    });
    registry.register(SearchCalendarEvent { groupware });
    registry
}

fn query_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": description}
        },
        "required": ["query"]
    })
}

fn query_top_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": description},
            "top": {"type": "integer", "description": "Maximum number of results"}
        },
        "required": ["query"]
    })
}

fn failed(name: &str) -> ToolError {
    ToolError::ExecutionFailed {
        name: name.to_string(),
    }
}

/// Returns the UTC day containing `now` as `[midnight, next midnight)`.
fn today_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc());
    (start, start + Duration::days(1))
}

struct FullContext {
    grounding: Arc<dyn GroundingProvider>,
}

#[async_trait]
impl Tool for FullContext {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_FULL_CONTEXT,
            "Search the knowledge base for background on a topic.",
            ToolCategory::Grounding,
        )
        .with_parameters(query_schema("What to look up"))
        .with_label("Getting full context...")
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let query = required_str(GET_FULL_CONTEXT, &params, "query")?;
        let digest = self
            .grounding
            .search(query)
            .await
            .context(failed(GET_FULL_CONTEXT))?;
        Ok(ToolOutput::Text(digest))
    }
}

struct EmailContext {
    groupware: Arc<dyn GroupwareService>,
    default_top: u32,
}

#[async_trait]
impl Tool for EmailContext {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_EMAIL_CONTEXT,
            "Search the user's mailbox.",
            ToolCategory::Email,
        )
        .with_parameters(query_top_schema("Words to search for in mail"))
        .with_label("Getting email context...")
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let query = required_str(GET_EMAIL_CONTEXT, &params, "query")?;
        let top = optional_u32(GET_EMAIL_CONTEXT, &params, "top")?.unwrap_or(self.default_top);
        let messages = self
            .groupware
            .search_email(query, top)
            .await
            .context(failed(GET_EMAIL_CONTEXT))?;
        ToolOutput::structured(GET_EMAIL_CONTEXT, &messages)
    }
}

struct FileContext {
    groupware: Arc<dyn GroupwareService>,
    default_top: u32,
}

#[async_trait]
impl Tool for FileContext {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_FILE_CONTEXT,
            "Search the user's files.",
            ToolCategory::Files,
        )
        .with_parameters(query_top_schema("Words to search for in file names and content"))
        .with_label("Getting file context...")
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let query = required_str(GET_FILE_CONTEXT, &params, "query")?;
        let top = optional_u32(GET_FILE_CONTEXT, &params, "top")?.unwrap_or(self.default_top);
        let files = self
            .groupware
            .search_files(query, top)
            .await
            .context(failed(GET_FILE_CONTEXT))?;
        ToolOutput::structured(GET_FILE_CONTEXT, &files)
    }
}

struct CalendarEventsInPeriod {
    groupware: Arc<dyn GroupwareService>,
}

#[async_trait]
impl Tool for CalendarEventsInPeriod {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_CALENDAR_EVENTS_IN_PERIOD,
            "List calendar events between two instants.",
            ToolCategory::Calendar,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "start_datetime": {
                    "type": "string",
                    "description": "Start of the period, RFC 3339 (e.g. 2024-03-15T00:00:00Z)"
                },
                "end_datetime": {
                    "type": "string",
                    "description": "End of the period, RFC 3339"
                }
            },
            "required": ["start_datetime", "end_datetime"]
        }))
        .with_label("Getting calendar events in period...")
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let name = GET_CALENDAR_EVENTS_IN_PERIOD;
        let start = required_datetime(name, &params, "start_datetime")?;
        let end = required_datetime(name, &params, "end_datetime")?;
        let events = self
            .groupware
            .calendar_events_between(start, end)
            .await
            .context(failed(name))?;
        ToolOutput::structured(name, &events)
    }
}

struct NextCalendarEvent {
    groupware: Arc<dyn GroupwareService>,
}

#[async_trait]
impl Tool for NextCalendarEvent {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_NEXT_CALENDAR_EVENT,
            "Get the user's next calendar event.",
            ToolCategory::Calendar,
        )
        .with_label("Getting next calendar event...")
    }

    async fn execute(&self, _params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let event = self
            .groupware
            .next_calendar_event(Utc::now())
            .await
            .context(failed(GET_NEXT_CALENDAR_EVENT))?;
        match event {
            Some(event) => ToolOutput::structured(GET_NEXT_CALENDAR_EVENT, &event),
            None => Ok(ToolOutput::Text("No upcoming events.".to_string())),
        }
    }
}

struct CalendarEventsToday {
    groupware: Arc<dyn GroupwareService>,
}

#[async_trait]
impl Tool for CalendarEventsToday {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_CALENDAR_EVENTS_FROM_TODAY,
            "List today's calendar events.",
            ToolCategory::Calendar,
        )
        .with_label("Getting calendar events for today...")
    }

    async fn execute(&self, _params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let (start, end) = today_bounds(Utc::now());
        let events = self
            .groupware
            .calendar_events_between(start, end)
            .await
            .context(failed(GET_CALENDAR_EVENTS_FROM_TODAY))?;
        ToolOutput::structured(GET_CALENDAR_EVENTS_FROM_TODAY, &events)
    }
}

struct SearchCalendarEvent {
    groupware: Arc<dyn GroupwareService>,
}

#[async_trait]
impl Tool for SearchCalendarEvent {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            SEARCH_CALENDAR_EVENT,
            "Find calendar events by subject.",
            ToolCategory::Calendar,
        )
        .with_parameters(query_schema("Text contained in the event subject"))
        .with_label("Searching calendar events...")
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, Report<ToolError>> {
        let query = required_str(SEARCH_CALENDAR_EVENT, &params, "query")?;
        let events = self
            .groupware
            .search_calendar_events(query)
            .await
            .context(failed(SEARCH_CALENDAR_EVENT))?;
        ToolOutput::structured(SEARCH_CALENDAR_EVENT, &events)
    }
}
