//! CalendarBackend trait definition.
//!
//! A backend is the thin client the sync engine talks to: it lists the
//! upcoming events it needs for deduplication, and creates or updates one
//! event at a time.

use std::future::Future;
use std::pin::Pin;

use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPayload, EventRef};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the orchestrator can hold a
/// `dyn CalendarBackend`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The operations the sync engine needs from a calendar.
///
/// Implementations must be `Send + Sync`; the engine issues calls
/// sequentially and never shares a backend across concurrent runs.
pub trait CalendarBackend: Send + Sync {
    /// Returns the backend name (e.g. "google", "memory").
    fn name(&self) -> &str;

    /// Lists up to `max_results` upcoming events, ordered by start time.
    ///
    /// Cancelled events are not returned.
    fn list_upcoming_events(
        &self,
        max_results: usize,
    ) -> BoxFuture<'_, CalendarResult<Vec<CalendarEvent>>>;

    /// Creates an event.
    fn create_event(&self, payload: EventPayload) -> BoxFuture<'_, CalendarResult<EventRef>>;

    /// Replaces the fields of an existing event.
    ///
    /// Attendees are only changed when `payload.attendees` is set.
    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        payload: EventPayload,
    ) -> BoxFuture<'a, CalendarResult<EventRef>>;
}

/// A backend that fails every call with the same error.
///
/// Stands in for a backend that could not be initialised.
#[derive(Debug)]
pub struct ErrorBackend {
    name: String,
    error: CalendarError,
}

impl ErrorBackend {
    pub fn new(name: impl Into<String>, error: CalendarError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> CalendarError {
        CalendarError::new(self.error.code(), self.error.message()).with_backend(&self.name)
    }
}

impl CalendarBackend for ErrorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_upcoming_events(
        &self,
        _max_results: usize,
    ) -> BoxFuture<'_, CalendarResult<Vec<CalendarEvent>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn create_event(&self, _payload: EventPayload) -> BoxFuture<'_, CalendarResult<EventRef>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn update_event<'a>(
        &'a self,
        _event_id: &'a str,
        _payload: EventPayload,
    ) -> BoxFuture<'a, CalendarResult<EventRef>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}
