//! Google Calendar API client.
//!
//! A thin HTTP client over the Calendar v3 `events` endpoints used by the
//! sync engine: list, insert and patch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPayload};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google limits `maxResults` per page to 2500.
const MAX_PAGE_SIZE: usize = 2500;

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a client authenticating with the given access token.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> CalendarResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                CalendarError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Lists single (expanded) events starting at or after `time_min`,
    /// ordered by start time, following pagination up to `max_results`.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        max_results: usize,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = max_results.saturating_sub(events.len()).clamp(1, MAX_PAGE_SIZE);
            let mut request = self
                .http_client
                .get(self.events_url(calendar_id))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("timeMin", time_min.to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                    ("maxResults", page_size.to_string()),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: EventListResponse = self.execute(request).await?;
            events.extend(page.items.into_iter().filter(|e| !e.is_cancelled()));

            match page.next_page_token {
                Some(token) if events.len() < max_results => page_token = Some(token),
                _ => break,
            }
        }

        events.truncate(max_results);
        debug!(count = events.len(), calendar_id, "listed upcoming events");
        Ok(events)
    }

    /// Inserts a new event.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> CalendarResult<CalendarEvent> {
        let request = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .json(payload);
        self.execute(request).await
    }

    /// Patches an existing event. Fields absent from the payload are kept.
    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
    ) -> CalendarResult<CalendarEvent> {
        let url = format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        );
        let request = self
            .http_client
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(payload);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> CalendarResult<T> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            CalendarError::network(message).with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = response.text().await.unwrap_or_default();
            let err = CalendarError::from_status(status.as_u16(), &body);
            return Err(match retry_after {
                Some(secs) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    CalendarError::rate_limited(format!(
                        "rate limit exceeded, retry after {} seconds",
                        secs
                    ))
                }
                _ => err,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::network(format!("failed to read response: {}", e)))?;
        parse_body(&body)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> CalendarResult<T> {
    serde_json::from_str(body).map_err(|e| {
        CalendarError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
    })
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarErrorCode;

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "kind": "calendar#events",
            "items": [
                {
                    "id": "event1",
                    "summary": "Physiotherapy",
                    "location": "Clinic A",
                    "start": {"dateTime": "2026-02-23T08:00:00-05:00", "timeZone": "America/Toronto"},
                    "end": {"dateTime": "2026-02-23T09:00:00-05:00", "timeZone": "America/Toronto"},
                    "attendees": [{"email": "family@example.com", "responseStatus": "needsAction"}],
                    "status": "confirmed"
                },
                {
                    "id": "event2",
                    "start": {"date": "2026-02-24"},
                    "end": {"date": "2026-02-25"}
                }
            ],
            "nextPageToken": "page-2"
        }"#;

        let response: EventListResponse = parse_body(json).unwrap();
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].attendees[0].email, "family@example.com");
        assert_eq!(response.items[1].summary, None);
        assert_eq!(response.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn malformed_body_is_invalid_response() {
        let err = parse_body::<EventListResponse>("<html>").unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::InvalidResponse);
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let client = GoogleCalendarClient::new("token", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            client.events_url("family@group.calendar.google.com"),
            "http://localhost:9999/calendars/family%40group.calendar.google.com/events"
        );
    }
}
