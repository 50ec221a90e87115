//! Date and time parsing for free-form portal text.
//!
//! Patient portals render appointment dates and times in whatever format the
//! vendor picked. This module turns that text into canonical values:
//!
//! - [`parse_date`] returns a [`NaiveDate`] or `None`. A date is never
//!   guessed: text that matches no known format is reported as unparsed and
//!   the caller must drop the appointment.
//! - [`parse_time`] always returns a [`ParsedTime`]. Text that matches no
//!   known format falls back to [`ParsedTime::default`] (09:00 Eastern).
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use portalsync_core::parse::{parse_date, parse_time};
//!
//! let date = parse_date("Mon, 23 Feb 2026").unwrap();
//! assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 23).unwrap());
//!
//! let time = parse_time("10:30 PM EDT");
//! assert_eq!((time.hour, time.minute), (22, 30));
//! assert_eq!(time.zone_name(), "America/Toronto");
//! ```

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Zone used when the portal text carries no timezone.
pub const REFERENCE_ZONE: Tz = Tz::America__Toronto;

/// Hour used when no time can be read from the portal text.
pub const DEFAULT_HOUR: u32 = 9;

/// Month names, January first. Three-letter abbreviations are prefixes.
const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// `[weekday,] DD MonthName YYYY`
static DAY_MONTH_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\b(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?\s*,?\s*)?\b(\d{1,2})\s+([a-z]+)\.?,?\s+(\d{4})\b",
    )
    .expect("Invalid day-month-year regex")
});

/// `MonthName DD[,] YYYY`
static MONTH_DAY_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("Invalid month-day-year regex")
});

/// `YYYY-MM-DD`, optionally followed by a `T` time part.
static ISO_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:t|\b)").expect("Invalid ISO date regex")
});

/// `H:MM am|pm [TZ]`
static TWELVE_HOUR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}):(\d{2})\s*(a\.?m\.?|p\.?m\.?)(?:\s+(est|edt|cst|cdt|mst|mdt|pst|pdt)\b)?",
    )
    .expect("Invalid 12-hour regex")
});

/// `HH:MM[:SS]`
static TWENTY_FOUR_HOUR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?\b").expect("Invalid 24-hour regex")
});

/// `H am|pm` without minutes.
static HOUR_ONLY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s*(a\.?m\.?|p\.?m\.?)$").expect("Invalid hour-only regex")
});

/// Formats tried by the generic date fallback, in order.
const FALLBACK_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Which rule produced a parsed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `[weekday,] DD MonthName YYYY`
    DayMonthYear,
    /// `MonthName DD[,] YYYY`
    MonthDayYear,
    /// `YYYY-MM-DD`
    Iso,
    /// Numeric and RFC formats tried last.
    Fallback,
}

/// Looks up a month by full name or three-letter abbreviation.
///
/// Returns the month number (1-12).
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    if name == "sept" {
        return Some(9);
    }
    MONTH_NAMES
        .iter()
        .position(|full| *full == name || (name.len() == 3 && full.starts_with(&name)))
        .map(|idx| idx as u32 + 1)
}

/// Maps a North American timezone abbreviation to its IANA zone.
///
/// Daylight and standard variants map to the same zone.
pub fn zone_for_abbreviation(abbreviation: &str) -> Option<Tz> {
    match abbreviation.to_ascii_uppercase().as_str() {
        "EST" | "EDT" => Some(Tz::America__Toronto),
        "CST" | "CDT" => Some(Tz::America__Chicago),
        "MST" | "MDT" => Some(Tz::America__Denver),
        "PST" | "PDT" => Some(Tz::America__Los_Angeles),
        _ => None,
    }
}

/// Parses a portal date string.
///
/// Tries, in order: `[weekday,] DD MonthName YYYY`, `MonthName DD[,] YYYY`,
/// `YYYY-MM-DD`, then a generic fallback (`MM/DD/YYYY`, `YYYY/MM/DD`,
/// `DD.MM.YYYY`, RFC 3339, RFC 2822).
///
/// Returns `None` if no rule yields a valid Gregorian date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_date_detailed(text).map(|(date, _)| date)
}

/// Like [`parse_date`] but also reports which rule matched.
pub fn parse_date_detailed(text: &str) -> Option<(NaiveDate, DateFormat)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        warn!("empty date string");
        return None;
    }
    let clean = trimmed.to_lowercase();

    if let Some(caps) = DAY_MONTH_YEAR_REGEX.captures(&clean)
        && let Some(date) = date_from_parts(&caps[3], month_number(&caps[2]), &caps[1])
    {
        return Some((date, DateFormat::DayMonthYear));
    }

    if let Some(caps) = MONTH_DAY_YEAR_REGEX.captures(&clean)
        && let Some(date) = date_from_parts(&caps[3], month_number(&caps[1]), &caps[2])
    {
        return Some((date, DateFormat::MonthDayYear));
    }

    if let Some(caps) = ISO_DATE_REGEX.captures(&clean)
        && let Some(date) = date_from_parts(&caps[1], caps[2].parse().ok(), &caps[3])
    {
        return Some((date, DateFormat::Iso));
    }

    if let Some(date) = parse_date_fallback(trimmed) {
        debug!(date_text = trimmed, %date, "date parsed by fallback");
        return Some((date, DateFormat::Fallback));
    }

    warn!(date_text = trimmed, "failed to parse date");
    None
}

/// Builds a date from captured components, rejecting impossible dates.
fn date_from_parts(year: &str, month: Option<u32>, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month?, day)
}

fn parse_date_fallback(text: &str) -> Option<NaiveDate> {
    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.date_naive())
}

/// A time of day with the zone it was expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTime {
    /// Hour, 0-23.
    pub hour: u32,
    /// Minute, 0-59.
    pub minute: u32,
    /// IANA zone of the wall-clock time.
    pub timezone: Tz,
}

impl Default for ParsedTime {
    /// 09:00 in the reference zone.
    fn default() -> Self {
        Self {
            hour: DEFAULT_HOUR,
            minute: 0,
            timezone: REFERENCE_ZONE,
        }
    }
}

impl ParsedTime {
    /// Creates a time, returning `None` if hour or minute is out of range.
    pub fn new(hour: u32, minute: u32, timezone: Tz) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self {
            hour,
            minute,
            timezone,
        })
    }

    /// Returns the IANA identifier of the zone (e.g. `America/Toronto`).
    pub fn zone_name(&self) -> &'static str {
        self.timezone.name()
    }
}

impl fmt::Display for ParsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} {}", self.hour, self.minute, self.zone_name())
    }
}

/// Parses a portal time string. Never fails.
///
/// Tries, in order: 12-hour `H:MM am|pm [TZ]` (zone defaults to Eastern),
/// 24-hour `HH:MM[:SS]` (always Eastern), then `H am|pm` and `noon`.
/// Anything else yields [`ParsedTime::default`].
pub fn parse_time(text: &str) -> ParsedTime {
    let clean = text.trim();
    if clean.is_empty() {
        warn!("empty time string, using default");
        return ParsedTime::default();
    }

    if let Some(time) = parse_twelve_hour(clean) {
        return time;
    }

    if let Some(caps) = TWENTY_FOUR_HOUR_REGEX.captures(clean)
        && let (Ok(hour), Ok(minute)) = (caps[1].parse(), caps[2].parse())
        && let Some(time) = ParsedTime::new(hour, minute, REFERENCE_ZONE)
    {
        return time;
    }

    if let Some(time) = parse_time_fallback(clean) {
        debug!(time_text = clean, %time, "time parsed by fallback");
        return time;
    }

    warn!(time_text = clean, "could not parse time, using default");
    ParsedTime::default()
}

fn parse_twelve_hour(text: &str) -> Option<ParsedTime> {
    let caps = TWELVE_HOUR_REGEX.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let timezone = caps
        .get(4)
        .and_then(|m| zone_for_abbreviation(m.as_str()))
        .unwrap_or(REFERENCE_ZONE);

    ParsedTime::new(to_twenty_four_hour(hour, &caps[3])?, minute, timezone)
}

fn parse_time_fallback(text: &str) -> Option<ParsedTime> {
    let lower = text.to_ascii_lowercase();
    if lower == "noon" || lower == "midday" {
        return ParsedTime::new(12, 0, REFERENCE_ZONE);
    }

    let caps = HOUR_ONLY_REGEX.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    ParsedTime::new(to_twenty_four_hour(hour, &caps[2])?, 0, REFERENCE_ZONE)
}

/// Converts a 12-hour clock hour to 24-hour form. 12 am is midnight.
fn to_twenty_four_hour(hour: u32, meridiem: &str) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let is_pm = meridiem.to_ascii_lowercase().starts_with('p');
    Some(match (is_pm, hour) {
        (false, 12) => 0,
        (false, h) => h,
        (true, 12) => 12,
        (true, h) => h + 12,
    })
}

/// Formats a duration in minutes as `45m`, `1h` or `1h 30m`.
pub fn format_duration(minutes: i64) -> String {
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod dates {
        use super::*;

        #[test]
        fn same_date_across_formats() {
            let expected = date(2026, 2, 23);
            assert_eq!(parse_date("Mon, 23 Feb 2026"), Some(expected));
            assert_eq!(parse_date("February 23, 2026"), Some(expected));
            assert_eq!(parse_date("2026-02-23"), Some(expected));
        }

        #[test]
        fn reports_matching_rule() {
            assert_eq!(
                parse_date_detailed("Mon, 23 Feb 2026").map(|(_, f)| f),
                Some(DateFormat::DayMonthYear)
            );
            assert_eq!(
                parse_date_detailed("February 23, 2026").map(|(_, f)| f),
                Some(DateFormat::MonthDayYear)
            );
            assert_eq!(
                parse_date_detailed("2026-02-23").map(|(_, f)| f),
                Some(DateFormat::Iso)
            );
            assert_eq!(
                parse_date_detailed("02/23/2026").map(|(_, f)| f),
                Some(DateFormat::Fallback)
            );
        }

        #[test]
        fn day_month_year_variants() {
            assert_eq!(parse_date("23 Feb 2026"), Some(date(2026, 2, 23)));
            assert_eq!(parse_date("Monday, 2 March 2026"), Some(date(2026, 3, 2)));
            assert_eq!(parse_date("  TUE, 3 MAR 2026  "), Some(date(2026, 3, 3)));
            assert_eq!(parse_date("Wed, 16 Sept 2026"), Some(date(2026, 9, 16)));
        }

        #[test]
        fn month_day_year_variants() {
            assert_eq!(parse_date("March 5 2026"), Some(date(2026, 3, 5)));
            assert_eq!(parse_date("Dec 1, 2026"), Some(date(2026, 12, 1)));
            assert_eq!(parse_date("Tuesday, March 3rd, 2026"), Some(date(2026, 3, 3)));
        }

        #[test]
        fn iso_embedded_in_text() {
            assert_eq!(parse_date("on 2026-07-01"), Some(date(2026, 7, 1)));
            assert_eq!(parse_date("2026-02-23 10:00"), Some(date(2026, 2, 23)));
            assert_eq!(parse_date("2026-02-23T10:00"), Some(date(2026, 2, 23)));
            assert_eq!(
                parse_date_detailed("2026-02-23T10:00:00").map(|(_, f)| f),
                Some(DateFormat::Iso)
            );
        }

        #[test]
        fn fallback_formats() {
            assert_eq!(parse_date("02/23/2026"), Some(date(2026, 2, 23)));
            assert_eq!(parse_date("2026/02/23"), Some(date(2026, 2, 23)));
            assert_eq!(parse_date("23.02.2026"), Some(date(2026, 2, 23)));
            assert_eq!(
                parse_date("2026-02-23T10:00:00-05:00"),
                Some(date(2026, 2, 23))
            );
        }

        #[test]
        fn unparseable_is_explicit() {
            assert_eq!(parse_date("not a date"), None);
            assert_eq!(parse_date(""), None);
            assert_eq!(parse_date("   "), None);
            assert_eq!(parse_date("TBD"), None);
        }

        #[test]
        fn impossible_dates_are_not_clamped() {
            assert_eq!(parse_date("31 Feb 2026"), None);
            assert_eq!(parse_date("February 30, 2026"), None);
            assert_eq!(parse_date("2026-13-01"), None);
            assert_eq!(parse_date("29 Feb 2027"), None);
            assert_eq!(parse_date("29 Feb 2028"), Some(date(2028, 2, 29)));
        }

        #[test]
        fn unknown_month_name() {
            assert_eq!(parse_date("23 Foo 2026"), None);
        }

        #[test]
        fn month_table() {
            assert_eq!(month_number("jan"), Some(1));
            assert_eq!(month_number("January"), Some(1));
            assert_eq!(month_number("may"), Some(5));
            assert_eq!(month_number("sept"), Some(9));
            assert_eq!(month_number("Dec."), Some(12));
            assert_eq!(month_number("ja"), None);
            assert_eq!(month_number("janu"), None);
        }
    }

    mod times {
        use super::*;

        #[test]
        fn twelve_hour_with_zone() {
            let t = parse_time("8:00 am EST");
            assert_eq!((t.hour, t.minute), (8, 0));
            assert_eq!(t.zone_name(), "America/Toronto");

            let t = parse_time("10:30 PM EDT");
            assert_eq!((t.hour, t.minute), (22, 30));
            assert_eq!(t.zone_name(), "America/Toronto");
        }

        #[test]
        fn twelve_hour_zone_variants() {
            assert_eq!(parse_time("1:15 pm CST").zone_name(), "America/Chicago");
            assert_eq!(parse_time("1:15 pm CDT").zone_name(), "America/Chicago");
            assert_eq!(parse_time("1:15 pm MST").zone_name(), "America/Denver");
            assert_eq!(parse_time("1:15 pm MDT").zone_name(), "America/Denver");
            assert_eq!(parse_time("1:15 pm pst").zone_name(), "America/Los_Angeles");
            assert_eq!(parse_time("1:15 pm PDT").zone_name(), "America/Los_Angeles");
        }

        #[test]
        fn twelve_hour_defaults_to_eastern() {
            let t = parse_time("2:45 p.m.");
            assert_eq!((t.hour, t.minute), (14, 45));
            assert_eq!(t.timezone, REFERENCE_ZONE);
        }

        #[test]
        fn midnight_and_noon() {
            assert_eq!(parse_time("12:00 am").hour, 0);
            assert_eq!(parse_time("12:30 PM").hour, 12);
            assert_eq!(parse_time("12:05 a.m. EST").hour, 0);
        }

        #[test]
        fn twenty_four_hour() {
            let t = parse_time("14:00");
            assert_eq!((t.hour, t.minute), (14, 0));
            assert_eq!(t.zone_name(), "America/Toronto");

            let t = parse_time("07:05:30");
            assert_eq!((t.hour, t.minute), (7, 5));
        }

        #[test]
        fn out_of_range_falls_back_to_default() {
            assert_eq!(parse_time("25:00"), ParsedTime::default());
            assert_eq!(parse_time("10:75"), ParsedTime::default());
        }

        #[test]
        fn invalid_twelve_hour_uses_twenty_four_hour_rule() {
            let t = parse_time("13:00 pm");
            assert_eq!((t.hour, t.minute), (13, 0));
        }

        #[test]
        fn hour_only_and_noon() {
            assert_eq!(parse_time("9 am").hour, 9);
            assert_eq!(parse_time("3pm").hour, 15);
            assert_eq!(parse_time("Noon").hour, 12);
        }

        #[test]
        fn garbage_defaults() {
            let t = parse_time("garbage");
            assert_eq!((t.hour, t.minute), (9, 0));
            assert_eq!(t.zone_name(), "America/Toronto");
            assert_eq!(parse_time(""), ParsedTime::default());
            assert_eq!(parse_time("2026"), ParsedTime::default());
        }

        #[test]
        fn parsed_time_bounds() {
            assert!(ParsedTime::new(23, 59, REFERENCE_ZONE).is_some());
            assert!(ParsedTime::new(24, 0, REFERENCE_ZONE).is_none());
            assert!(ParsedTime::new(0, 60, REFERENCE_ZONE).is_none());
        }

        #[test]
        fn display() {
            assert_eq!(parse_time("8:05 am").to_string(), "08:05 America/Toronto");
        }

        #[test]
        fn abbreviations() {
            assert_eq!(zone_for_abbreviation("edt"), Some(Tz::America__Toronto));
            assert_eq!(zone_for_abbreviation("UTC"), None);
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(90), "1h 30m");
    }
}
