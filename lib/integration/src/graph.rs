//! Microsoft Graph groupware client.
//!
//! Only read queries are exposed. Graph payloads are reduced to compact
//! records carrying just what a model needs to answer questions about
//! meetings, mail and documents.

use crate::credential::IdentityProvider;
use crate::error::GroupwareError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode, Url};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// How far ahead `next_calendar_event` looks.
const NEXT_EVENT_HORIZON_DAYS: i64 = 30;

/// Read-only groupware queries used by the assistant's tools.
#[async_trait]
pub trait GroupwareService: Send + Sync {
    /// Events overlapping `[start, end)`, ordered by start time.
    async fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>>;

    /// The first event starting at or after `after`, if any.
    async fn next_calendar_event(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>, Report<GroupwareError>>;

    /// Events whose subject contains `query`.
    async fn search_calendar_events(
        &self,
        query: &str,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>>;

    /// Mail matching `query`, most relevant first.
    async fn search_email(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<EmailMessage>, Report<GroupwareError>>;

    /// Files in the user's drive matching `query`.
    async fn search_files(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<DriveFile>, Report<GroupwareError>>;
}

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub subject: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// A mail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// A file in the user's drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Microsoft Graph connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphConfig {
    /// API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page size when a tool does not ask for one.
    #[serde(default = "default_top")]
    pub default_top: u32,
}

fn default_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_top() -> u32 {
    10
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_top: default_top(),
        }
    }
}

/// Groupware service backed by Microsoft Graph.
#[derive(Clone)]
pub struct MicrosoftGraph {
    http: Client,
    config: GraphConfig,
    identity: Arc<dyn IdentityProvider>,
}

impl MicrosoftGraph {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the HTTP client cannot be built.
    pub fn new(
        config: GraphConfig,
        identity: Arc<dyn IdentityProvider>,
        timeout: std::time::Duration,
    ) -> Result<Self, Report<GroupwareError>> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GroupwareError::ConnectionFailed {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            identity,
        })
    }

    fn url(&self, path: &str) -> Result<Url, GroupwareError> {
        let joined = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| GroupwareError::ProtocolError {
            reason: format!("invalid URL {joined}: {e}"),
        })
    }

    /// Builds the drive search URL, percent-encoding the quoted query as a
    /// single path segment.
    fn drive_search_url(&self, query: &str) -> Result<Url, GroupwareError> {
        let mut url = self.url("/me/drive/root")?;
        url.path_segments_mut()
            .map_err(|()| GroupwareError::ProtocolError {
                reason: "graph base URL cannot carry a path".to_string(),
            })?
            .push(&format!("search(q={})", odata_quote(query)));
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Report<GroupwareError>> {
        let url = self.url(path)?;
        self.fetch(url, query).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Report<GroupwareError>> {
        let credential = self
            .identity
            .credential()
            .await
            .context(GroupwareError::Credential)?;

        debug!(url = %url, "graph request");

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(credential.secret())
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %url, "graph request failed");
                if e.is_timeout() {
                    GroupwareError::Timeout
                } else {
                    GroupwareError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, url = %url, "graph returned error");
            return Err(status_error(status, body, retry_after_secs).into());
        }

        response
            .json()
            .await
            .map_err(|e| {
                GroupwareError::ProtocolError {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    async fn calendar_view(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        top: u32,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>> {
        let page: Collection<GraphEvent> = self
            .get(
                "/me/calendarView",
                &[
                    ("startDateTime", start.to_rfc3339()),
                    ("endDateTime", end.to_rfc3339()),
                    ("$orderby", "start/dateTime".to_string()),
                    ("$top", top.to_string()),
                    ("$select", EVENT_FIELDS.to_string()),
                ],
            )
            .await?;
        Ok(page.value.into_iter().map(CalendarEvent::from).collect())
    }
}

impl std::fmt::Debug for MicrosoftGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrosoftGraph")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GroupwareService for MicrosoftGraph {
    #[instrument(skip(self))]
    async fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>> {
        self.calendar_view(start, end, self.config.default_top).await
    }

    #[instrument(skip(self))]
    async fn next_calendar_event(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>, Report<GroupwareError>> {
        let horizon = after + Duration::days(NEXT_EVENT_HORIZON_DAYS);
        let events = self.calendar_view(after, horizon, 1).await?;
        Ok(events.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn search_calendar_events(
        &self,
        query: &str,
    ) -> Result<Vec<CalendarEvent>, Report<GroupwareError>> {
        let page: Collection<GraphEvent> = self
            .get(
                "/me/events",
                &[
                    ("$filter", format!("contains(subject,{})", odata_quote(query))),
                    ("$top", self.config.default_top.to_string()),
                    ("$select", EVENT_FIELDS.to_string()),
                ],
            )
            .await?;
        Ok(page.value.into_iter().map(CalendarEvent::from).collect())
    }

    #[instrument(skip(self))]
    async fn search_email(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<EmailMessage>, Report<GroupwareError>> {
        let page: Collection<GraphMessage> = self
            .get(
                "/me/messages",
                &[
                    ("$search", format!("\"{}\"", query.replace('"', ""))),
                    ("$top", top.to_string()),
                    ("$select", "subject,from,receivedDateTime,bodyPreview".to_string()),
                ],
            )
            .await?;
        Ok(page.value.into_iter().map(EmailMessage::from).collect())
    }

    #[instrument(skip(self))]
    async fn search_files(
        &self,
        query: &str,
        top: u32,
    ) -> Result<Vec<DriveFile>, Report<GroupwareError>> {
        let url = self.drive_search_url(query)?;
        let page: Collection<GraphDriveItem> = self
            .fetch(url, &[("$top", top.to_string())])
            .await?;
        Ok(page.value.into_iter().map(DriveFile::from).collect())
    }
}

const EVENT_FIELDS: &str = "subject,start,end,location,organizer,bodyPreview";

/// Quotes a string literal for an OData expression.
fn odata_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn status_error(status: StatusCode, body: String, retry_after_secs: Option<u64>) -> GroupwareError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GroupwareError::AuthenticationFailed { reason: body }
        }
        StatusCode::TOO_MANY_REQUESTS => GroupwareError::RateLimited { retry_after_secs },
        _ => GroupwareError::RequestFailed {
            status: status.as_u16(),
            reason: body,
        },
    }
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEmailAddress {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: GraphEmailAddress,
}

impl GraphRecipient {
    fn display(self) -> Option<String> {
        let GraphEmailAddress { name, address } = self.email_address;
        match (name, address) {
            (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    #[serde(default)]
    subject: Option<String>,
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(default)]
    location: Option<GraphLocation>,
    #[serde(default)]
    organizer: Option<GraphRecipient>,
    #[serde(default)]
    body_preview: Option<String>,
}

impl From<GraphEvent> for CalendarEvent {
    fn from(event: GraphEvent) -> Self {
        Self {
            subject: event.subject.unwrap_or_default(),
            start: event.start.date_time,
            end: event.end.date_time,
            location: event
                .location
                .and_then(|l| l.display_name)
                .filter(|l| !l.is_empty()),
            organizer: event.organizer.and_then(GraphRecipient::display),
            preview: event.body_preview.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<GraphRecipient>,
    #[serde(default)]
    received_date_time: Option<String>,
    #[serde(default)]
    body_preview: Option<String>,
}

impl From<GraphMessage> for EmailMessage {
    fn from(message: GraphMessage) -> Self {
        Self {
            subject: message.subject.unwrap_or_default(),
            from: message.from.and_then(GraphRecipient::display),
            received: message.received_date_time,
            preview: message.body_preview.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    name: String,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    last_modified_date_time: Option<String>,
}

impl From<GraphDriveItem> for DriveFile {
    fn from(item: GraphDriveItem) -> Self {
        Self {
            name: item.name,
            web_url: item.web_url,
            modified: item.last_modified_date_time,
        }
    }
}
