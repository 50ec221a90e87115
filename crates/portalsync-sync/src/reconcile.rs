//! Reconciliation of scraped appointments against calendar events.
//!
//! Appointments and events are matched by [`DedupKey`]. A matching event is
//! updated in place; otherwise a new event is created with the family
//! attendees invited. Items are processed one at a time and a backend
//! failure on one item is recorded as skipped without stopping the rest.

use std::collections::HashMap;

use portalsync_calendar::{CalendarBackend, CalendarError, CalendarEvent, EventPayload, EventRef};
use portalsync_core::{DedupKey, NormalizedAppointment};
use tracing::{debug, error, info};

/// What happened to one appointment.
#[derive(Debug)]
pub enum ReconcileOutcome {
    Created { key: DedupKey, event: EventRef },
    Updated { key: DedupKey, event: EventRef },
    Skipped { key: DedupKey, error: CalendarError },
}

impl ReconcileOutcome {
    pub fn key(&self) -> &DedupKey {
        match self {
            Self::Created { key, .. } | Self::Updated { key, .. } | Self::Skipped { key, .. } => {
                key
            }
        }
    }
}

/// Counters and per-item outcomes of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// One entry per appointment, in input order.
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileReport {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match &outcome {
            ReconcileOutcome::Created { .. } => self.created += 1,
            ReconcileOutcome::Updated { .. } => self.updated += 1,
            ReconcileOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Maps dedup keys to event ids.
///
/// When two existing events share a key the first one listed wins.
#[derive(Debug, Default)]
pub struct EventIndex {
    ids: HashMap<DedupKey, String>,
}

impl EventIndex {
    pub fn from_events(events: &[CalendarEvent]) -> Self {
        let mut index = Self::default();
        for event in events {
            let Some(key) = event.dedup_key() else {
                debug!(event_id = %event.id, "ignoring event without a usable start time");
                continue;
            };
            if let Some(kept) = index.ids.get(&key) {
                debug!(
                    key = %key,
                    kept = %kept,
                    ignored = %event.id,
                    "duplicate dedup key among existing events"
                );
                continue;
            }
            index.ids.insert(key, event.id.clone());
        }
        index
    }

    pub fn get(&self, key: &DedupKey) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn insert_new(&mut self, key: DedupKey, event_id: String) {
        self.ids.entry(key).or_insert(event_id);
    }
}

/// Applies appointments to a calendar backend.
pub struct Reconciler<'a> {
    backend: &'a dyn CalendarBackend,
    family_attendees: &'a [String],
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn CalendarBackend, family_attendees: &'a [String]) -> Self {
        Self {
            backend,
            family_attendees,
        }
    }

    /// Creates or updates one event per appointment.
    pub async fn reconcile(
        &self,
        appointments: &[NormalizedAppointment],
        existing: &[CalendarEvent],
    ) -> ReconcileReport {
        let mut index = EventIndex::from_events(existing);
        let mut report = ReconcileReport::default();
        debug!(
            appointments = appointments.len(),
            indexed = index.len(),
            backend = self.backend.name(),
            "reconciling"
        );

        for appointment in appointments {
            let key = appointment.dedup_key();
            let outcome = match index.get(&key).map(str::to_string) {
                Some(event_id) => self.update(key, &event_id, appointment).await,
                None => {
                    let outcome = self.create(key, appointment).await;
                    if let ReconcileOutcome::Created { key, event } = &outcome {
                        index.insert_new(key.clone(), event.id.clone());
                    }
                    outcome
                }
            };
            report.record(outcome);
        }

        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "reconciliation finished"
        );
        report
    }

    async fn create(&self, key: DedupKey, appointment: &NormalizedAppointment) -> ReconcileOutcome {
        let payload =
            EventPayload::from(appointment).with_attendees(self.family_attendees.iter().cloned());
        match self.backend.create_event(payload).await {
            Ok(event) => {
                info!(
                    summary = %appointment.summary,
                    start = %appointment.start.to_iso(),
                    event_id = %event.id,
                    "created event"
                );
                ReconcileOutcome::Created { key, event }
            }
            Err(error) => {
                error!(
                    summary = %appointment.summary,
                    start = %appointment.start.to_iso(),
                    error = %error,
                    "failed to create event"
                );
                ReconcileOutcome::Skipped { key, error }
            }
        }
    }

    async fn update(
        &self,
        key: DedupKey,
        event_id: &str,
        appointment: &NormalizedAppointment,
    ) -> ReconcileOutcome {
        match self
            .backend
            .update_event(event_id, EventPayload::from(appointment))
            .await
        {
            Ok(event) => {
                info!(summary = %appointment.summary, event_id, "updated event");
                ReconcileOutcome::Updated { key, event }
            }
            Err(error) => {
                error!(
                    summary = %appointment.summary,
                    event_id,
                    error = %error,
                    "failed to update event"
                );
                ReconcileOutcome::Skipped { key, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portalsync_calendar::{BackendCall, EventTime, InMemoryBackend};
    use portalsync_core::{RawAppointment, normalize, parse_time};

    fn appointment(day: u32, summary: &str) -> NormalizedAppointment {
        let raw = RawAppointment::new(
            format!("2026-03-{:02}", day),
            "10:00 am EST",
            summary,
            "Clinic A",
        );
        let date = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        normalize(&raw, date, parse_time(&raw.time_text), "MockPortal")
    }

    fn existing(id: &str, day: u32, summary: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: Some(summary.into()),
            description: None,
            location: Some("Clinic A".into()),
            start: EventTime::timed(format!("2026-03-{:02}T10:00:00", day), "America/Toronto"),
            end: EventTime::timed(format!("2026-03-{:02}T11:00:00", day), "America/Toronto"),
            attendees: Vec::new(),
            html_link: None,
            status: Some("confirmed".into()),
        }
    }

    fn family() -> Vec<String> {
        vec!["mom@example.com".into(), "dad@example.com".into()]
    }

    #[test]
    fn index_keeps_first_seen_duplicate() {
        let events = [
            existing("first", 2, "Checkup"),
            existing("second", 2, "Checkup"),
            existing("other", 3, "Checkup"),
        ];
        let index = EventIndex::from_events(&events);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&appointment(2, "Checkup").dedup_key()), Some("first"));
    }

    #[test]
    fn index_skips_events_without_start() {
        let mut event = existing("x", 2, "Checkup");
        event.start = EventTime::default();
        assert!(EventIndex::from_events(&[event]).is_empty());
    }

    #[tokio::test]
    async fn creates_new_and_updates_matching() {
        let backend = InMemoryBackend::with_events(vec![existing("evt-1", 2, "Checkup")]);
        let family = family();
        let reconciler = Reconciler::new(&backend, &family);
        let existing = backend.list_upcoming_events(100).await.unwrap();

        let report = reconciler
            .reconcile(&[appointment(2, "Checkup"), appointment(5, "X-Ray")], &existing)
            .await;

        assert_eq!((report.created, report.updated, report.skipped), (1, 1, 0));
        assert!(matches!(
            &report.outcomes[0],
            ReconcileOutcome::Updated { event, .. } if event.id == "evt-1"
        ));
        assert!(matches!(&report.outcomes[1], ReconcileOutcome::Created { .. }));

        let created = backend
            .events()
            .into_iter()
            .find(|e| e.summary.as_deref() == Some("X-Ray"))
            .unwrap();
        let emails: Vec<_> = created.attendees.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, ["mom@example.com", "dad@example.com"]);
    }

    #[tokio::test]
    async fn updates_leave_attendees_alone() {
        let mut event = existing("evt-1", 2, "Checkup");
        event.attendees = vec![portalsync_calendar::Attendee::new("aunt@example.com")];
        let backend = InMemoryBackend::with_events(vec![event]);
        let family = family();
        let existing = backend.list_upcoming_events(100).await.unwrap();

        Reconciler::new(&backend, &family)
            .reconcile(&[appointment(2, "Checkup")], &existing)
            .await;

        let events = backend.events();
        assert_eq!(events[0].attendees.len(), 1);
        assert_eq!(events[0].attendees[0].email, "aunt@example.com");
    }

    #[tokio::test]
    async fn failed_item_is_skipped_and_the_rest_continue() {
        let backend = InMemoryBackend::new().fail_creates([2]);
        let family = Vec::new();
        let appointments = [appointment(2, "A"), appointment(3, "B"), appointment(4, "C")];

        let report = Reconciler::new(&backend, &family)
            .reconcile(&appointments, &[])
            .await;

        assert_eq!((report.created, report.updated, report.skipped), (2, 0, 1));
        assert!(matches!(&report.outcomes[1], ReconcileOutcome::Skipped { .. }));
        assert_eq!(report.outcomes[1].key(), &appointments[1].dedup_key());
        assert_eq!(backend.events().len(), 2);
    }

    #[tokio::test]
    async fn same_key_twice_in_one_run_creates_once() {
        let backend = InMemoryBackend::new();
        let family = Vec::new();
        let report = Reconciler::new(&backend, &family)
            .reconcile(&[appointment(2, "Checkup"), appointment(2, "Checkup")], &[])
            .await;

        assert_eq!((report.created, report.updated), (1, 1));
        assert_eq!(backend.events().len(), 1);
        assert!(matches!(
            backend.calls().last(),
            Some(BackendCall::Update { event_id, .. }) if event_id == "mem-1"
        ));
    }

    #[tokio::test]
    async fn failed_update_is_skipped() {
        let backend =
            InMemoryBackend::with_events(vec![existing("evt-1", 2, "Checkup")]).fail_updates([1]);
        let family = Vec::new();
        let existing = backend.list_upcoming_events(100).await.unwrap();

        let report = Reconciler::new(&backend, &family)
            .reconcile(&[appointment(2, "Checkup")], &existing)
            .await;

        assert_eq!((report.created, report.updated, report.skipped), (0, 0, 1));
    }
}
