//! Google Calendar backend.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::backend::{BoxFuture, CalendarBackend};
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPayload, EventRef};

use super::client::GoogleCalendarClient;
use super::tokens::TokenStorage;

/// A [`CalendarBackend`] writing to one Google calendar.
#[derive(Debug)]
pub struct GoogleCalendarBackend {
    client: GoogleCalendarClient,
    calendar_id: String,
}

impl GoogleCalendarBackend {
    pub fn new(client: GoogleCalendarClient, calendar_id: impl Into<String>) -> Self {
        Self {
            client,
            calendar_id: calendar_id.into(),
        }
    }

    /// Builds a backend from a provisioned token file.
    ///
    /// Fails if the file is missing, unreadable, or holds an expired token.
    pub fn from_token_file(
        path: &Path,
        calendar_id: impl Into<String>,
        timeout: Duration,
    ) -> CalendarResult<Self> {
        let tokens = TokenStorage::new(path)
            .load_valid()
            .map_err(|e| e.with_backend("google"))?;
        let client = GoogleCalendarClient::new(tokens.access_token, timeout)?;
        let backend = Self::new(client, calendar_id);
        info!(calendar_id = %backend.calendar_id, "Google Calendar backend ready");
        Ok(backend)
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }
}

fn tag(error: CalendarError) -> CalendarError {
    error.with_backend("google")
}

impl CalendarBackend for GoogleCalendarBackend {
    fn name(&self) -> &str {
        "google"
    }

    fn list_upcoming_events(
        &self,
        max_results: usize,
    ) -> BoxFuture<'_, CalendarResult<Vec<CalendarEvent>>> {
        Box::pin(async move {
            self.client
                .list_events(&self.calendar_id, Utc::now(), max_results)
                .await
                .map_err(tag)
        })
    }

    fn create_event(&self, payload: EventPayload) -> BoxFuture<'_, CalendarResult<EventRef>> {
        Box::pin(async move {
            let event = self
                .client
                .insert_event(&self.calendar_id, &payload)
                .await
                .map_err(tag)?;
            Ok(EventRef {
                id: event.id,
                link: event.html_link,
            })
        })
    }

    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        payload: EventPayload,
    ) -> BoxFuture<'a, CalendarResult<EventRef>> {
        Box::pin(async move {
            let event = self
                .client
                .patch_event(&self.calendar_id, event_id, &payload)
                .await
                .map_err(tag)?;
            Ok(EventRef {
                id: event.id,
                link: event.html_link,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarErrorCode;
    use tempfile::TempDir;

    #[test]
    fn missing_token_file_fails_with_backend_tag() {
        let dir = TempDir::new().unwrap();
        let err = GoogleCalendarBackend::from_token_file(
            &dir.path().join("missing.json"),
            "primary",
            Duration::from_secs(30),
        )
        .unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::ConfigurationError);
        assert_eq!(err.backend(), Some("google"));
    }

    #[test]
    fn token_file_builds_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token": "abc"}"#).unwrap();

        let backend =
            GoogleCalendarBackend::from_token_file(&path, "family", Duration::from_secs(30))
                .unwrap();
        assert_eq!(backend.name(), "google");
        assert_eq!(backend.calendar_id(), "family");
    }
}
