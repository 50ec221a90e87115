//! Appointment types and the normalization pipeline.
//!
//! A scraper produces [`RawAppointment`] rows of free text. The normalizer
//! parses their date and time, builds a start/end pair and a display
//! description, and yields a [`NormalizedAppointment`]. Rows whose date
//! cannot be read are dropped, never guessed.
//!
//! ```text
//! RawAppointment ──parse_date/parse_time──▶ normalize() ──▶ NormalizedAppointment
//!                                                              │
//!                                                              ▼ dedup_key()
//!                                                           DedupKey
//! ```

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::parse::{ParsedTime, parse_date, parse_time};

/// Appointments last this long; portals do not report a duration.
pub const APPOINTMENT_DURATION_MINUTES: i64 = 60;

/// Summary used when a row has no description text.
pub const DEFAULT_SUMMARY: &str = "Medical Appointment";

/// Timestamp layout shared by normalized appointments and calendar payloads.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One appointment row as scraped from a portal page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAppointment {
    /// Date cell text (e.g. `Mon, 23 Feb 2026`).
    pub date_text: String,
    /// Time cell text (e.g. `8:00 am EST`), possibly empty.
    pub time_text: String,
    /// Appointment type or description.
    pub description: String,
    /// Clinic or room.
    pub location: String,
}

impl RawAppointment {
    /// Creates a raw appointment row.
    pub fn new(
        date_text: impl Into<String>,
        time_text: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            date_text: date_text.into(),
            time_text: time_text.into(),
            description: description.into(),
            location: location.into(),
        }
    }
}

/// A wall-clock timestamp with the zone it is expressed in.
///
/// No zone arithmetic is applied: `date_time` is the local time in
/// `time_zone`, exactly as the portal showed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDateTime {
    /// Local wall-clock time.
    pub date_time: NaiveDateTime,
    /// IANA zone of `date_time`.
    pub time_zone: Tz,
}

impl EventDateTime {
    /// Creates a timestamp in the given zone.
    pub fn new(date_time: NaiveDateTime, time_zone: Tz) -> Self {
        Self {
            date_time,
            time_zone,
        }
    }

    /// Formats the timestamp as `YYYY-MM-DDTHH:MM:SS` (no offset).
    pub fn to_iso(&self) -> String {
        self.date_time.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Returns the IANA zone identifier.
    pub fn zone_name(&self) -> &'static str {
        self.time_zone.name()
    }
}

/// Deterministic identity of an appointment in the calendar.
///
/// Derived from the start timestamp, summary and location. Two entities are
/// the same appointment iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Builds a key from its three components.
    pub fn new(start: &str, summary: &str, location: &str) -> Self {
        Self(format!("{}|{}|{}", start, summary.trim(), location.trim()))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An appointment ready to be written to a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAppointment {
    /// Event title.
    pub summary: String,
    /// Multi-line description shown in the calendar.
    pub description: String,
    /// Location text, possibly empty.
    pub location: String,
    /// Start of the appointment.
    pub start: EventDateTime,
    /// End of the appointment (start + 60 minutes).
    pub end: EventDateTime,
    /// Portal adapter that produced the row.
    pub portal_type: String,
    /// The scraped row this was built from.
    pub raw: RawAppointment,
}

impl NormalizedAppointment {
    /// Returns the deduplication key of this appointment.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.start.to_iso(), &self.summary, &self.location)
    }
}

/// Builds a normalized appointment from a row and its parsed date and time.
pub fn normalize(
    raw: &RawAppointment,
    date: NaiveDate,
    time: ParsedTime,
    portal_type: &str,
) -> NormalizedAppointment {
    // ParsedTime guarantees hour < 24 and minute < 60.
    let wall_clock = NaiveTime::from_hms_opt(time.hour, time.minute, 0).unwrap_or_default();
    let start = date.and_time(wall_clock);
    let end = start + Duration::minutes(APPOINTMENT_DURATION_MINUTES);

    let summary = match raw.description.trim() {
        "" => DEFAULT_SUMMARY.to_string(),
        text => text.to_string(),
    };

    NormalizedAppointment {
        summary,
        description: build_description(raw, portal_type),
        location: raw.location.trim().to_string(),
        start: EventDateTime::new(start, time.timezone),
        end: EventDateTime::new(end, time.timezone),
        portal_type: portal_type.to_string(),
        raw: raw.clone(),
    }
}

/// Builds the calendar description embedding the original row text.
pub fn build_description(raw: &RawAppointment, portal_type: &str) -> String {
    let or_na = |s: &str| {
        let s = s.trim();
        if s.is_empty() { "N/A".to_string() } else { s.to_string() }
    };

    let mut lines = vec![
        "Appointment synced from Health Portal".to_string(),
        String::new(),
        format!("Type: {}", or_na(&raw.description)),
        format!("Location: {}", or_na(&raw.location)),
    ];
    if !portal_type.is_empty() {
        lines.push(format!("Source: {}", portal_type));
    }
    lines.join("\n")
}

/// Result of normalizing a batch of scraped rows.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    /// Rows that parsed, in input order.
    pub appointments: Vec<NormalizedAppointment>,
    /// Rows dropped because their date could not be parsed.
    pub dropped: Vec<RawAppointment>,
}

/// Parses and normalizes every row, dropping rows with unparseable dates.
pub fn normalize_all(rows: &[RawAppointment], portal_type: &str) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for raw in rows {
        let Some(date) = parse_date(&raw.date_text) else {
            warn!(
                date_text = %raw.date_text,
                description = %raw.description,
                "dropping appointment with unparseable date"
            );
            report.dropped.push(raw.clone());
            continue;
        };
        let time = parse_time(&raw.time_text);
        report.appointments.push(normalize(raw, date, time, portal_type));
    }

    debug!(
        normalized = report.appointments.len(),
        dropped = report.dropped.len(),
        "normalized scraped rows"
    );
    report
}
