//! CalendarBackend trait and implementations.
//!
//! - [`CalendarBackend`] - list, create and update operations used by the sync engine
//! - [`CalendarEvent`], [`EventPayload`], [`EventRef`] - data shapes
//! - [`CalendarError`] - error type shared by every backend
//! - [`InMemoryBackend`] - a process-local calendar
//! - `google` (feature) - Google Calendar v3 REST backend
//!
//! ```text
//! ┌──────────────────────┐    ┌──────────────────┐
//! │ GoogleCalendarBackend│    │ InMemoryBackend  │
//! └──────────┬───────────┘    └────────┬─────────┘
//!            │   CalendarBackend       │
//!            └────────────┬────────────┘
//!                         ▼
//!                 reconciliation engine
//! ```

pub mod backend;
pub mod error;
pub mod event;
#[cfg(feature = "google")]
pub mod google;
pub mod memory;

pub use backend::{BoxFuture, CalendarBackend, ErrorBackend};
pub use error::{CalendarError, CalendarErrorCode, CalendarResult};
pub use event::{Attendee, CalendarEvent, EventPayload, EventRef, EventTime};
pub use memory::{BackendCall, InMemoryBackend};
