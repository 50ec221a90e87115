//! In-memory calendar backend.
//!
//! Persists created events so a second sync run sees what the first one
//! wrote. Individual create/update calls can be made to fail by their
//! 1-based call number.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::backend::{BoxFuture, CalendarBackend};
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPayload, EventRef};

/// A call recorded by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    List { max_results: usize },
    Create { summary: String },
    Update { event_id: String, summary: String },
}

#[derive(Debug, Default)]
struct State {
    events: Vec<CalendarEvent>,
    calls: Vec<BackendCall>,
    next_id: usize,
    creates: usize,
    updates: usize,
    failing_creates: HashSet<usize>,
    failing_updates: HashSet<usize>,
}

/// A calendar held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with existing events.
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let backend = Self::new();
        backend.lock().events = events;
        backend
    }

    /// Makes the given create calls (1-based) fail with a server error.
    pub fn fail_creates(self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.lock().failing_creates.extend(calls);
        self
    }

    /// Makes the given update calls (1-based) fail with a server error.
    pub fn fail_updates(self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.lock().failing_updates.extend(calls);
        self
    }

    /// Returns a snapshot of the stored events.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.lock().events.clone()
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn list(&self, max_results: usize) -> Vec<CalendarEvent> {
        let mut state = self.lock();
        state.calls.push(BackendCall::List { max_results });

        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|event| !event.is_cancelled())
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start.local_timestamp());
        events.truncate(max_results);
        events
    }

    fn create(&self, payload: EventPayload) -> CalendarResult<EventRef> {
        let mut state = self.lock();
        state.creates += 1;
        state.calls.push(BackendCall::Create {
            summary: payload.summary.clone(),
        });
        if state.failing_creates.contains(&state.creates) {
            return Err(CalendarError::server(format!(
                "injected failure on create #{}",
                state.creates
            ))
            .with_backend("memory"));
        }

        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        let link = format!("memory://events/{}", id);
        state.events.push(CalendarEvent {
            id: id.clone(),
            summary: Some(payload.summary),
            description: Some(payload.description),
            location: Some(payload.location),
            start: payload.start,
            end: payload.end,
            attendees: payload.attendees.unwrap_or_default(),
            html_link: Some(link.clone()),
            status: Some("confirmed".into()),
        });
        debug!(event_id = %id, "created in-memory event");

        Ok(EventRef {
            id,
            link: Some(link),
        })
    }

    fn update(&self, event_id: &str, payload: EventPayload) -> CalendarResult<EventRef> {
        let mut state = self.lock();
        state.updates += 1;
        state.calls.push(BackendCall::Update {
            event_id: event_id.to_string(),
            summary: payload.summary.clone(),
        });
        if state.failing_updates.contains(&state.updates) {
            return Err(CalendarError::server(format!(
                "injected failure on update #{}",
                state.updates
            ))
            .with_backend("memory"));
        }

        let event = state
            .events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| {
                CalendarError::not_found(format!("no event with id {}", event_id))
                    .with_backend("memory")
            })?;

        event.summary = Some(payload.summary);
        event.description = Some(payload.description);
        event.location = Some(payload.location);
        event.start = payload.start;
        event.end = payload.end;
        if let Some(attendees) = payload.attendees {
            event.attendees = attendees;
        }

        Ok(EventRef {
            id: event.id.clone(),
            link: event.html_link.clone(),
        })
    }
}

impl CalendarBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_upcoming_events(
        &self,
        max_results: usize,
    ) -> BoxFuture<'_, CalendarResult<Vec<CalendarEvent>>> {
        Box::pin(async move { Ok(self.list(max_results)) })
    }

    fn create_event(&self, payload: EventPayload) -> BoxFuture<'_, CalendarResult<EventRef>> {
        Box::pin(async move { self.create(payload) })
    }

    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        payload: EventPayload,
    ) -> BoxFuture<'a, CalendarResult<EventRef>> {
        Box::pin(async move { self.update(event_id, payload) })
    }
}
