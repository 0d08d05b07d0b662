//! In-memory fakes for unit tests.

use crate::turn::StatusSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cxo_chat_ai::{ChatBackend, ChatRequest, LlmError, ModelResponse};
use cxo_chat_grounding::{GroundingError, GroundingProvider};
use cxo_chat_integration::{
    CalendarEvent, DriveFile, EmailMessage, GroupwareError, GroupwareService,
};
use rootcause::Report;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Backend answering from a script, then repeating `fallback` if set.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn forever(response: ModelResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, Report<LlmError>> {
        self.requests.lock().expect("lock").push(request.clone());
        let next = self.script.lock().expect("lock").pop_front();
        match (next, &self.fallback) {
            (Some(Ok(response)), _) => Ok(response),
            (Some(Err(error)), _) => Err(error.into()),
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(LlmError::ResponseParseFailed {
                reason: "script exhausted".to_string(),
            }
            .into()),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// A groupware service whose calls are recorded.
#[derive(Default)]
pub struct FakeGroupware {
    pub events: Vec<CalendarEvent>,
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
    pub ranges: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeGroupware {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) -> Result<(), Report<GroupwareError>> {
        self.calls.lock().expect("lock").push(call);
        if self.fail {
            return Err(GroupwareError::Timeout.into());
        }
        Ok(())
    }
}

#[async_trait]
impl GroupwareService for FakeGroupware {
    async fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>> {
        self.record("calendar_events_between".to_string())?;
        self.ranges.lock().expect("lock").push((start, end));
        Ok(self.events.clone())
    }

    async fn next_calendar_event(
        &self,
        _after: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>, Report<GroupwareError>> {
        self.record("next_calendar_event".to_string())?;
        Ok(self.events.first().cloned())
    }

    async fn search_calendar_events(
        &self,
        query: &str,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>> {
        self.record(format!("search_calendar_events:{query}"))?;
        Ok(self
            .events
            .iter()
            .filter(|e| e.subject.contains(query))
            .cloned()
            .collect())
    }

    async fn search_email(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<EmailMessage>, Report<GroupwareError>> {
        self.record(format!("search_email:{query}:{top}"))?;
        Ok(vec![EmailMessage {
            subject: format!("Re: {query}"),
            from: Some("cfo@example.com".to_string()),
            received: None,
            preview: None,
        }])
    }

    async fn search_files(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<DriveFile>, Report<GroupwareError>> {
        self.record(format!("search_files:{query}:{top}"))?;
        Ok(vec![DriveFile {
            name: format!("{query}.docx"),
            web_url: None,
            modified: None,
        }])
    }
}

/// Grounding that echoes the query.
#[derive(Default)]
pub struct EchoGrounding {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl GroundingProvider for EchoGrounding {
    async fn search(&self, query: &str) -> Result<String, Report<GroundingError>> {
        self.queries.lock().expect("lock").push(query.to_string());
        Ok(format!("[1] Notes about {query}\n"))
    }
}

/// Status sink recording every notification.
#[derive(Default)]
pub struct RecordingStatus {
    pub events: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock").clone()
    }
}

impl StatusSink for RecordingStatus {
    fn tool_started(&self, label: &str) {
        self.events.lock().expect("lock").push(label.to_string());
    }

    fn turn_completed(&self, found: bool) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("completed:{found}"));
    }
}

pub fn board_meeting() -> CalendarEvent {
    CalendarEvent {
        subject: "Board meeting".to_string(),
        start: "2024-03-15T09:00:00".to_string(),
        end: "2024-03-15T10:00:00".to_string(),
        location: Some("Room 4".to_string()),
        organizer: None,
        preview: None,
    }
}
