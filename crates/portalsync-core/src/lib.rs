//! Core types: date/time parsing, appointments, normalization, dedup keys

pub mod appointment;
pub mod parse;
pub mod tracing;

pub use appointment::{
    APPOINTMENT_DURATION_MINUTES, DEFAULT_SUMMARY, DedupKey, EventDateTime, NormalizeReport,
    NormalizedAppointment, RawAppointment, TIMESTAMP_FORMAT, build_description, normalize,
    normalize_all,
};
pub use parse::{
    DateFormat, ParsedTime, REFERENCE_ZONE, format_duration, month_number, parse_date,
    parse_date_detailed, parse_time, zone_for_abbreviation,
};
pub use self::tracing::{
    BoxedSubscriber, TracingConfig, TracingError, TracingOutputFormat, build_subscriber,
    init_tracing,
};
