//! Adapter for the Shine Partners patient portal (patientconnect.shinepartners.ca).
//!
//! The portal redirects anonymous visitors to a sign-in page, lists
//! appointments in a table whose first column holds the date on one line and
//! the time on the next, and has no stable appointments URL, so navigation
//! tries the nav link first and then a few well-known paths.

use std::sync::LazyLock;

use portalsync_core::RawAppointment;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::contract::{BoxFuture, PortalScraper, ScraperConfig, ScraperState};
use crate::error::{ScrapeError, ScrapeResult};
use crate::html::{self, LoginForm};
use crate::retry::retry_navigation;
use crate::session::{Page, PortalSession, fetch_ok};

pub const PORTAL_TYPE: &str = "ShinePartners";

/// Used when the date cell has no time line.
pub const DEFAULT_TIME: &str = "09:00 am EST";

const CANDIDATE_PATHS: [&str; 3] = [
    "/appointments",
    "/portal/appointments",
    "/patient/appointments",
];

static USERNAME: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    html::selectors(&[
        r#"input[name="username"]"#,
        r#"input[name="email"]"#,
        r#"input[id="username"]"#,
        r#"input[id="email"]"#,
        r#"input[type="email"]"#,
    ])
});
static PASSWORD: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    html::selectors(&[
        r#"input[name="password"]"#,
        r#"input[id="password"]"#,
        r#"input[type="password"]"#,
    ])
});
static LOGIN_ERROR: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    html::selectors(&[".error", ".alert-danger", r#"[role="alert"]"#, ".login-error"])
});
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid link selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("Invalid table selector"));
static HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("Invalid header selector"));

/// Scraper for Shine Partners.
#[derive(Debug)]
pub struct ShinePartnersScraper {
    config: ScraperConfig,
    portal: Url,
    session: PortalSession,
    state: ScraperState,
}

impl ShinePartnersScraper {
    pub fn new(config: ScraperConfig) -> ScrapeResult<Self> {
        let portal = Url::parse(&config.portal_url).map_err(|e| {
            ScrapeError::auth(&config.portal_url, format!("invalid portal URL: {}", e))
        })?;
        let session = PortalSession::new(&config.portal_url, config.timeout)?;
        Ok(Self {
            config,
            portal,
            session,
            state: ScraperState::Idle,
        })
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

        if !is_login_page(&page) {
            debug!("already authenticated (session active)");
            return Ok(());
        }

        let form = find_login_form(&page).ok_or_else(|| {
            self.auth_error("could not find login form fields; page structure may have changed")
        })?;
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
        if is_login_page(&response) && find_login_form(&response).is_some() {
            return Err(self.auth_error("still on the sign-in page after submitting credentials"));
        }
        Ok(())
    }
}

fn is_login_page(page: &Page) -> bool {
    page.url_contains("login") || page.url_contains("signin")
}

fn find_login_form(page: &Page) -> Option<LoginForm> {
    let document = Html::parse_document(&page.body);
    LoginForm::find(&document, &page.url, &USERNAME, &PASSWORD)
}

fn login_error(page: &Page) -> Option<String> {
    html::first_message(&Html::parse_document(&page.body), &LOGIN_ERROR)
}

fn title_mentions_appointments(page: &Page) -> bool {
    html::page_title(&Html::parse_document(&page.body))
        .to_lowercase()
        .contains("appointment")
}

/// The target of the first link pointing at, or labelled, appointments.
fn appointments_link(page: &Page) -> Option<Url> {
    let document = Html::parse_document(&page.body);
    document.select(&LINK).find_map(|link| {
        let href = link.value().attr("href")?;
        let label = html::element_text(link).to_lowercase();
        if href.to_lowercase().contains("appointment") || label.contains("appointments") {
            page.url.join(href).ok()
        } else {
            None
        }
    })
}

/// One navigation attempt: nav link, then well-known paths, then whatever
/// page we already have if it mentions appointments.
async fn locate_appointments(
    session: &PortalSession,
    portal: &Url,
    current: Option<&Page>,
) -> Result<Page, String> {
    let mut fallback = current.cloned();

    if let Some(link) = current.and_then(appointments_link) {
        match fetch_ok(session, link.as_str()).await {
            Ok(page) if title_mentions_appointments(&page) => return Ok(page),
            Ok(page) => fallback = Some(page),
            Err(e) => debug!(url = %link, error = %e, "appointments link failed"),
        }
    }

    for path in CANDIDATE_PATHS {
        let Ok(url) = portal.join(path) else { continue };
        match fetch_ok(session, url.as_str()).await {
            Ok(page) if title_mentions_appointments(&page) => {
                debug!(url = %url, "found appointments page");
                return Ok(page);
            }
            Ok(_) => debug!(url = %url, "page title does not mention appointments"),
            Err(e) => debug!(url = %url, error = %e, "candidate appointments URL failed"),
        }
    }

    match fallback {
        Some(page) if page.body.to_lowercase().contains("appointment") => Ok(page),
        _ => Err("could not navigate to appointments page".to_string()),
    }
}

fn header_texts(table: ElementRef<'_>) -> Vec<String> {
    table
        .select(&HEADER)
        .map(|th| html::element_text(th).to_lowercase())
        .collect()
}

/// Reads appointment rows from the appointments page.
///
/// The table whose headers mention both "date" and "appointment" wins;
/// otherwise the first table is used.
pub fn extract_rows(body: &str, portal_url: &str) -> ScrapeResult<Vec<RawAppointment>> {
    let document = Html::parse_document(body);
    let tables: Vec<_> = document.select(&TABLE).collect();
    if tables.is_empty() {
        return Err(ScrapeError::extraction(portal_url, "no tables on appointments page"));
    }

    let table = tables
        .iter()
        .copied()
        .find(|table| {
            let headers = header_texts(*table);
            headers.iter().any(|h| h.contains("date"))
                && headers.iter().any(|h| h.contains("appointment"))
        })
        .unwrap_or(tables[0]);

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

        let mut lines = html::element_lines(cells[0]).into_iter();
        let Some(date_text) = lines.next() else {
            debug!("skipping row (empty date cell)");
            continue;
        };
        let time_text = lines.next().unwrap_or_else(|| DEFAULT_TIME.to_string());

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

impl PortalScraper for ShinePartnersScraper {
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
            debug!("navigating to appointments page");

            let start = self.session.current().cloned();
            let current = start.as_ref();
            let portal = &self.portal;
            let session = &self.session;
            let target = portal.as_str();
            let page = retry_navigation(
                &self.config.retry,
                &self.config.portal_url,
                target,
                move |_| locate_appointments(session, portal, current),
            )
            .await?;
            self.session.set_current(page);

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
