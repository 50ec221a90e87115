//! Adapter for the local mock patient portal.
//!
//! Login form at the portal root, appointments at `/appointments.html` in a
//! `.appointments-table`. Each row's first cell holds `.date` and `.time`
//! elements; the second cell is the appointment type, the third the
//! location.

use std::sync::LazyLock;

use portalsync_core::RawAppointment;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::contract::{BoxFuture, PortalScraper, ScraperConfig, ScraperState};
use crate::error::{ScrapeError, ScrapeResult};
use crate::html::{self, LoginForm};
use crate::retry::retry_navigation;
use crate::session::{Page, PortalSession, fetch_ok};

pub const PORTAL_TYPE: &str = "MockPortal";

const APPOINTMENTS_PATH: &str = "appointments.html";

static USERNAME: LazyLock<Vec<Selector>> =
    LazyLock::new(|| html::selectors(&[r#"input[name="username"]"#]));
static PASSWORD: LazyLock<Vec<Selector>> =
    LazyLock::new(|| html::selectors(&[r#"input[name="password"]"#]));
static LOGIN_ERROR: LazyLock<Vec<Selector>> = LazyLock::new(|| html::selectors(&[".error"]));
static APPOINTMENTS_TABLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".appointments-table").expect("Invalid appointments table selector")
});
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("Invalid table selector"));
static DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".date").expect("Invalid date selector"));
static TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".time").expect("Invalid time selector"));

/// Scraper for the mock portal used in development and tests.
#[derive(Debug)]
pub struct MockPortalScraper {
    config: ScraperConfig,
    session: PortalSession,
    state: ScraperState,
}

impl MockPortalScraper {
    pub fn new(config: ScraperConfig) -> ScrapeResult<Self> {
        let session = PortalSession::new(&config.portal_url, config.timeout)?;
        Ok(Self {
            config,
            session,
            state: ScraperState::Idle,
        })
    }

    fn appointments_url(&self) -> String {
        format!("{}/{}", self.config.base_url(), APPOINTMENTS_PATH)
    }

    fn auth_error(&self, message: impl Into<String>) -> ScrapeError {
        ScrapeError::auth(&self.config.portal_url, message)
    }

    async fn login(&mut self) -> ScrapeResult<()> {
        let portal_url = self.config.portal_url.as_str();
        let session = &self.session;
        let page = retry_navigation(&self.config.retry, portal_url, portal_url, move |_| {
            fetch_ok(session, portal_url)
        })
        .await?;
        self.session.set_current(page.clone());

        if page.url_contains(APPOINTMENTS_PATH) {
            debug!("already authenticated (session active)");
            return Ok(());
        }

        let form = find_login_form(&page).ok_or_else(|| self.auth_error("login form not found"))?;
        let fields = form.fields(&self.config.username, &self.config.password);
        let response = self
            .session
            .submit(&form, &fields)
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        if let Some(message) = login_error(&response) {
            return Err(self.auth_error(format!("Login failed: {}", message)));
        }
        if !response.is_success() {
            return Err(self.auth_error(format!("login returned HTTP {}", response.status)));
        }
        if !(response.url_contains(APPOINTMENTS_PATH)
            || page_title(&response).contains("Appointments"))
        {
            return Err(self.auth_error("login did not reach the appointments page"));
        }
        Ok(())
    }
}

fn find_login_form(page: &Page) -> Option<LoginForm> {
    let document = Html::parse_document(&page.body);
    LoginForm::find(&document, &page.url, &USERNAME, &PASSWORD)
}

fn login_error(page: &Page) -> Option<String> {
    html::first_message(&Html::parse_document(&page.body), &LOGIN_ERROR)
}

fn page_title(page: &Page) -> String {
    html::page_title(&Html::parse_document(&page.body))
}

fn has_appointments_table(page: &Page) -> bool {
    Html::parse_document(&page.body)
        .select(&APPOINTMENTS_TABLE)
        .next()
        .is_some()
}

/// Reads appointment rows from the appointments page.
pub fn extract_rows(body: &str, portal_url: &str) -> ScrapeResult<Vec<RawAppointment>> {
    let document = Html::parse_document(body);
    let Some(table) = document.select(&TABLE).next() else {
        return Err(ScrapeError::extraction(portal_url, "no appointments table on page"));
    };

    let rows = html::table_rows(table);
    if rows.is_empty() {
        warn!("no appointment rows found");
        return Ok(Vec::new());
    }

    let mut appointments = Vec::new();
    for row in rows {
        let cells = html::row_cells(row);
        if cells.len() < 3 {
            debug!(cells = cells.len(), "skipping row (not enough columns)");
            continue;
        }

        let date_text = html::child_text(cells[0], &DATE).unwrap_or_default();
        if date_text.is_empty() {
            debug!("skipping row (empty date cell)");
            continue;
        }
        let time_text = html::child_text(cells[0], &TIME).unwrap_or_default();

        appointments.push(RawAppointment::new(
            date_text,
            time_text,
            html::element_text(cells[1]),
            html::element_text(cells[2]),
        ));
    }

    info!(count = appointments.len(), "extracted appointments");
    Ok(appointments)
}

impl PortalScraper for MockPortalScraper {
    fn portal_type(&self) -> &str {
        PORTAL_TYPE
    }

    fn portal_url(&self) -> &str {
        &self.config.portal_url
    }

    fn state(&self) -> ScraperState {
        self.state
    }

    fn authenticate(&mut self) -> BoxFuture<'_, ScrapeResult<()>> {
        Box::pin(async move {
            self.state.require(ScraperState::Idle)?;
            debug!(portal = %self.config.portal_url, "starting authentication");
            self.login().await?;
            self.state = ScraperState::Authenticated;
            info!("authentication successful");
            Ok(())
        })
    }

    fn navigate_to_appointments(&mut self) -> BoxFuture<'_, ScrapeResult<()>> {
        Box::pin(async move {
            self.state.require(ScraperState::Authenticated)?;

            let on_page = self.session.current().is_some_and(|page| {
                page.url_contains(APPOINTMENTS_PATH) && has_appointments_table(page)
            });
            if !on_page {
                let url = self.appointments_url();
                let target = url.as_str();
                let session = &self.session;
                let page = retry_navigation(
                    &self.config.retry,
                    &self.config.portal_url,
                    target,
                    move |_| async move {
                        let page = fetch_ok(session, target).await?;
                        if has_appointments_table(&page) {
                            Ok(page)
                        } else {
                            Err("appointments table not found".to_string())
                        }
                    },
                )
                .await?;
                self.session.set_current(page);
            }

            self.state = ScraperState::OnAppointmentsPage;
            info!("navigated to appointments page");
            Ok(())
        })
    }

    fn extract_appointments(&mut self) -> BoxFuture<'_, ScrapeResult<Vec<RawAppointment>>> {
        Box::pin(async move {
            self.state.require(ScraperState::OnAppointmentsPage)?;
            let page = self.session.current().ok_or_else(|| {
                ScrapeError::extraction(&self.config.portal_url, "no page loaded")
            })?;
            let rows = extract_rows(&page.body, &self.config.portal_url)?;
            self.state = ScraperState::Extracted;
            Ok(rows)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.session.close() })
    }
}
