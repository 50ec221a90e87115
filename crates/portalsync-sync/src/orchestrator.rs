//! One sync run: scrape, normalize, reconcile.

use std::fmt;

use portalsync_calendar::CalendarBackend;
use portalsync_core::normalize_all;
use portalsync_scrapers::{PortalScraper, ScrapeResult, ScraperConfig, create_scraper, scrape};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::credentials::CredentialCipher;
use crate::error::SyncResult;
use crate::reconcile::Reconciler;

/// Builds the adapter for a run.
pub type ScraperFactory =
    Box<dyn Fn(&SyncConfig, ScraperConfig) -> ScrapeResult<Box<dyn PortalScraper>> + Send + Sync>;

/// The registry-backed factory.
pub fn registry_factory() -> ScraperFactory {
    Box::new(|config: &SyncConfig, scraper_config: ScraperConfig| {
        create_scraper(&config.portal_type, scraper_config)
    })
}

/// Counters of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Rows read from the portal.
    pub scraped: usize,
    /// Rows that normalized.
    pub normalized: usize,
    /// Rows dropped for an unparseable date.
    pub dropped: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scraped, {} created, {} updated, {} skipped, {} dropped",
            self.scraped, self.created, self.updated, self.skipped, self.dropped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// `enabled = false`; nothing was done.
    Disabled,
    Completed(SyncSummary),
}

/// A single sync run over one portal account and one calendar.
pub struct SyncRun<'a> {
    config: &'a SyncConfig,
    cipher: &'a CredentialCipher,
    factory: ScraperFactory,
    backend: &'a dyn CalendarBackend,
}

impl<'a> SyncRun<'a> {
    /// `cipher` decrypts `password_encrypted` when the config carries one.
    pub fn new(
        config: &'a SyncConfig,
        cipher: &'a CredentialCipher,
        factory: ScraperFactory,
        backend: &'a dyn CalendarBackend,
    ) -> Self {
        Self {
            config,
            cipher,
            factory,
            backend,
        }
    }

    pub async fn run(self) -> SyncResult<SyncOutcome> {
        if !self.config.enabled {
            info!("sync is disabled, skipping run");
            return Ok(SyncOutcome::Disabled);
        }

        let password = self.config.resolve_password(self.cipher)?;
        let scraper_config = self.config.scraper_config(password);
        let mut scraper = (self.factory)(self.config, scraper_config)?;
        let portal_type = scraper.portal_type().to_string();
        info!(
            portal_type = %portal_type,
            portal = %self.config.portal_url,
            "starting sync"
        );

        let scraped = scrape(scraper.as_mut()).await;
        scraper.close().await;
        let rows = scraped?;

        let report = normalize_all(&rows, &portal_type);
        let mut summary = SyncSummary {
            scraped: rows.len(),
            normalized: report.appointments.len(),
            dropped: report.dropped.len(),
            ..SyncSummary::default()
        };
        if summary.dropped > 0 {
            warn!(dropped = summary.dropped, "some appointments had unparseable dates");
        }
        if report.appointments.is_empty() {
            info!(scraped = summary.scraped, "no appointments to sync");
            return Ok(SyncOutcome::Completed(summary));
        }

        let existing = match self
            .backend
            .list_upcoming_events(self.config.max_events)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                error!(backend = self.backend.name(), error = %e, "failed to list existing events");
                return Err(e.into());
            }
        };
        debug!(existing = existing.len(), "listed existing events");

        let reconciled = Reconciler::new(self.backend, &self.config.family_attendees)
            .reconcile(&report.appointments, &existing)
            .await;
        summary.created = reconciled.created;
        summary.updated = reconciled.updated;
        summary.skipped = reconciled.skipped;

        info!(%summary, "sync completed");
        Ok(SyncOutcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portalsync_calendar::InMemoryBackend;
    use portalsync_scrapers::ScrapeError;

    use crate::credentials::KeySource;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&KeySource::Explicit(vec![1; 32])).unwrap()
    }

    fn config() -> SyncConfig {
        SyncConfig {
            portal_url: "https://portal.example.org".into(),
            portal_type: "Nope".into(),
            username: "alice".into(),
            password: Some("pw".into()),
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn disabled_run_never_builds_a_scraper() {
        let config = SyncConfig {
            enabled: false,
            ..config()
        };
        let backend = InMemoryBackend::new();
        let factory: ScraperFactory = Box::new(
            |_: &SyncConfig, _: ScraperConfig| -> ScrapeResult<Box<dyn PortalScraper>> {
                panic!("factory must not be called")
            },
        );

        let outcome = SyncRun::new(&config, &cipher(), factory, &backend)
            .run()
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Disabled);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn unsupported_portal_fails_before_any_calendar_call() {
        let config = config();
        let backend = InMemoryBackend::new();

        let err = SyncRun::new(&config, &cipher(), registry_factory(), &backend)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, crate::SyncError::Scrape(ScrapeError::UnsupportedPortal { .. })));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn summary_display() {
        let summary = SyncSummary {
            scraped: 6,
            normalized: 5,
            dropped: 1,
            created: 5,
            updated: 0,
            skipped: 0,
        };
        assert_eq!(
            summary.to_string(),
            "6 scraped, 5 created, 0 updated, 0 skipped, 1 dropped"
        );
    }
}
