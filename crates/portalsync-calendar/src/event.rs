//! Calendar event shapes exchanged with backends.
//!
//! Field names follow the Google Calendar v3 JSON representation
//! (`dateTime`, `timeZone`, `htmlLink`) so the same types serve as the wire
//! format for the REST backend and as the model for the in-memory one.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use portalsync_core::{DedupKey, EventDateTime, NormalizedAppointment, TIMESTAMP_FORMAT};

/// A start or end time as stored by the calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// RFC 3339 timestamp, with or without offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// IANA zone identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    /// Creates a timed value from a wall-clock timestamp and zone name.
    pub fn timed(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }

    /// Returns the local wall-clock time as `YYYY-MM-DDTHH:MM:SS`.
    ///
    /// Offset-carrying timestamps are converted into `time_zone` when it names
    /// a known zone, otherwise their own local time is kept. All-day values
    /// yield the bare date.
    pub fn local_timestamp(&self) -> Option<String> {
        if let Some(ref text) = self.date_time {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                let zone = self.time_zone.as_deref().and_then(|z| z.parse::<Tz>().ok());
                let local = match zone {
                    Some(tz) => parsed.with_timezone(&tz).naive_local(),
                    None => parsed.naive_local(),
                };
                return Some(local.format(TIMESTAMP_FORMAT).to_string());
            }
            return NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .ok()
                .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());
        }
        self.date.clone()
    }
}

impl From<&EventDateTime> for EventTime {
    fn from(value: &EventDateTime) -> Self {
        Self::timed(value.to_iso(), value.zone_name())
    }
}

/// An event attendee, identified by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            response_status: None,
        }
    }
}

/// An event as listed by a calendar backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CalendarEvent {
    /// Computes the dedup key from start, summary and location.
    ///
    /// Returns `None` for events without a usable start time.
    pub fn dedup_key(&self) -> Option<DedupKey> {
        let start = self.start.local_timestamp()?;
        Some(DedupKey::new(
            &start,
            self.summary.as_deref().unwrap_or_default(),
            self.location.as_deref().unwrap_or_default(),
        ))
    }

    /// Returns true if the event has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// The body sent to create or update an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    /// `None` leaves the attendee list of an existing event untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

impl EventPayload {
    /// Attaches attendees by email.
    pub fn with_attendees<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = Some(emails.into_iter().map(Attendee::new).collect());
        self
    }
}

impl From<&NormalizedAppointment> for EventPayload {
    fn from(appointment: &NormalizedAppointment) -> Self {
        Self {
            summary: appointment.summary.clone(),
            description: appointment.description.clone(),
            location: appointment.location.clone(),
            start: EventTime::from(&appointment.start),
            end: EventTime::from(&appointment.end),
            attendees: None,
        }
    }
}

/// Identifies an event after a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub link: Option<String>,
}
