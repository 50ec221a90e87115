//! The contract every portal adapter implements.
//!
//! A scrape is three transitions over a single session:
//!
//! ```text
//! Idle --authenticate--> Authenticated --navigate--> OnAppointmentsPage --extract--> Extracted
//! ```
//!
//! Each transition checks the current state and fails with
//! [`ScrapeError::InvalidState`] when called out of order. [`scrape`] runs
//! the three in sequence and returns the first failure; it never retries a
//! stage itself (navigation retries happen inside the adapters, see
//! [`crate::retry`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use portalsync_core::RawAppointment;
use tracing::{error, info};

use crate::error::{ScrapeError, ScrapeResult};
use crate::retry::RetryPolicy;

/// A boxed future for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where a scraper is in the authenticate/navigate/extract sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScraperState {
    Idle,
    Authenticated,
    OnAppointmentsPage,
    Extracted,
}

impl ScraperState {
    /// Fails unless the current state is `expected`.
    pub fn require(self, expected: ScraperState) -> ScrapeResult<()> {
        if self == expected {
            Ok(())
        } else {
            Err(ScrapeError::InvalidState {
                expected,
                actual: self,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticated => "authenticated",
            Self::OnAppointmentsPage => "on-appointments-page",
            Self::Extracted => "extracted",
        }
    }
}

impl fmt::Display for ScraperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings handed to an adapter.
#[derive(Clone)]
pub struct ScraperConfig {
    pub portal_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for ScraperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperConfig")
            .field("portal_url", &self.portal_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ScraperConfig {
    pub fn new(
        portal_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            portal_url: portal_url.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The portal URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.portal_url.trim_end_matches('/')
    }
}

/// A portal adapter.
///
/// Implementations hold their own session and state; the orchestrator owns
/// the adapter for the duration of one sync run and always calls
/// [`close`](PortalScraper::close) at the end.
pub trait PortalScraper: Send {
    /// The portal type identifier (e.g. "ShinePartners").
    fn portal_type(&self) -> &str;

    fn portal_url(&self) -> &str;

    fn state(&self) -> ScraperState;

    /// Logs in. `Idle -> Authenticated`.
    fn authenticate(&mut self) -> BoxFuture<'_, ScrapeResult<()>>;

    /// Reaches the appointments listing. `Authenticated -> OnAppointmentsPage`.
    fn navigate_to_appointments(&mut self) -> BoxFuture<'_, ScrapeResult<()>>;

    /// Reads the appointment rows. `OnAppointmentsPage -> Extracted`.
    ///
    /// Zero rows is a valid result.
    fn extract_appointments(&mut self) -> BoxFuture<'_, ScrapeResult<Vec<RawAppointment>>>;

    /// Releases the session. Safe to call in any state, more than once.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Runs authenticate, navigate and extract in order.
pub async fn scrape(scraper: &mut dyn PortalScraper) -> ScrapeResult<Vec<RawAppointment>> {
    let result = async {
        scraper.authenticate().await?;
        scraper.navigate_to_appointments().await?;
        scraper.extract_appointments().await
    }
    .await;

    match &result {
        Ok(rows) => info!(
            portal_type = scraper.portal_type(),
            rows = rows.len(),
            "scrape finished"
        ),
        Err(e) => error!(
            portal = scraper.portal_url(),
            stage = e.stage(),
            error = %e,
            "scraping failed"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walks the state machine without any I/O.
    struct Scripted {
        state: ScraperState,
        fail_navigation: bool,
        rows: Vec<RawAppointment>,
    }

    impl Scripted {
        fn new(rows: Vec<RawAppointment>) -> Self {
            Self {
                state: ScraperState::Idle,
                fail_navigation: false,
                rows,
            }
        }
    }

    impl PortalScraper for Scripted {
        fn portal_type(&self) -> &str {
            "Scripted"
        }

        fn portal_url(&self) -> &str {
            "http://portal.test"
        }

        fn state(&self) -> ScraperState {
            self.state
        }

        fn authenticate(&mut self) -> BoxFuture<'_, ScrapeResult<()>> {
            Box::pin(async move {
                self.state.require(ScraperState::Idle)?;
                self.state = ScraperState::Authenticated;
                Ok(())
            })
        }

        fn navigate_to_appointments(&mut self) -> BoxFuture<'_, ScrapeResult<()>> {
            Box::pin(async move {
                self.state.require(ScraperState::Authenticated)?;
                if self.fail_navigation {
                    return Err(ScrapeError::Navigation {
                        portal_url: "http://portal.test".into(),
                        url: "http://portal.test/appointments".into(),
                        attempts: 3,
                        message: "HTTP 404".into(),
                    });
                }
                self.state = ScraperState::OnAppointmentsPage;
                Ok(())
            })
        }

        fn extract_appointments(
            &mut self,
        ) -> BoxFuture<'_, ScrapeResult<Vec<RawAppointment>>> {
            Box::pin(async move {
                self.state.require(ScraperState::OnAppointmentsPage)?;
                self.state = ScraperState::Extracted;
                Ok(std::mem::take(&mut self.rows))
            })
        }

        fn close(&mut self) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn scrape_runs_all_stages() {
        let rows = vec![RawAppointment::new("2026-02-23", "", "Checkup", "Clinic")];
        let mut scraper = Scripted::new(rows.clone());

        assert_eq!(scrape(&mut scraper).await.unwrap(), rows);
        assert_eq!(scraper.state(), ScraperState::Extracted);
    }

    #[tokio::test]
    async fn scrape_stops_at_first_failure() {
        let mut scraper = Scripted::new(vec![]);
        scraper.fail_navigation = true;

        let err = scrape(&mut scraper).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Navigation { attempts: 3, .. }));
        assert_eq!(scraper.state(), ScraperState::Authenticated);
    }

    #[tokio::test]
    async fn out_of_order_transition_is_rejected() {
        let mut scraper = Scripted::new(vec![]);
        let err = scraper.extract_appointments().await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::InvalidState {
                expected: ScraperState::OnAppointmentsPage,
                actual: ScraperState::Idle,
            }
        ));
    }

    #[test]
    fn config_debug_redacts_password() {
        let config = ScraperConfig::new("https://portal.test/", "alice", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert_eq!(config.base_url(), "https://portal.test");
    }
}
