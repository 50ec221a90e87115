//! HTTP session against a portal.
//!
//! A cookie-keeping `reqwest` client plus the last page it loaded. Adapters
//! parse [`Page::body`] synchronously; parsed documents are never held
//! across an await.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};
use crate::html::LoginForm;

const BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

/// A loaded page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive substring test on the final URL.
    pub fn url_contains(&self, needle: &str) -> bool {
        self.url.as_str().to_ascii_lowercase().contains(needle)
    }
}

/// A cookie-keeping browser stand-in.
#[derive(Debug)]
pub struct PortalSession {
    portal_url: String,
    client: Option<reqwest::Client>,
    current: Option<Page>,
}

impl PortalSession {
    pub fn new(portal_url: impl Into<String>, timeout: Duration) -> ScrapeResult<Self> {
        let portal_url = portal_url.into();
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| ScrapeError::Http {
                url: portal_url.clone(),
                source,
            })?;

        Ok(Self {
            portal_url,
            client: Some(client),
            current: None,
        })
    }

    /// The most recently loaded page.
    pub fn current(&self) -> Option<&Page> {
        self.current.as_ref()
    }

    fn client(&self) -> ScrapeResult<&reqwest::Client> {
        self.client.as_ref().ok_or_else(|| ScrapeError::SessionClosed {
            portal_url: self.portal_url.clone(),
        })
    }

    /// Records `page` as the current page.
    pub fn set_current(&mut self, page: Page) {
        self.current = Some(page);
    }

    /// Loads `url` without touching the current page.
    pub async fn fetch(&self, url: &str) -> ScrapeResult<Page> {
        let request = self.client()?.get(url);
        self.send(url, request).await
    }

    /// Loads `url` and makes it the current page.
    pub async fn get(&mut self, url: &str) -> ScrapeResult<Page> {
        let page = self.fetch(url).await?;
        self.set_current(page.clone());
        Ok(page)
    }

    /// Submits a login form with the given fields.
    pub async fn submit(
        &mut self,
        form: &LoginForm,
        fields: &[(String, String)],
    ) -> ScrapeResult<Page> {
        let client = self.client()?;
        let request = if form.is_get {
            client.get(form.action.clone()).query(fields)
        } else {
            client.post(form.action.clone()).form(fields)
        };
        let page = self.send(form.action.as_str(), request).await?;
        self.set_current(page.clone());
        Ok(page)
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> ScrapeResult<Page> {
        let http_err = |source| ScrapeError::Http {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(http_err)?;
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await.map_err(http_err)?;
        debug!(url = %final_url, status, bytes = body.len(), "loaded portal page");

        Ok(Page {
            url: final_url,
            status,
            body,
        })
    }

    /// Drops the client and its cookies.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(portal = %self.portal_url, "portal session closed");
        }
        self.current = None;
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }
}

/// Loads a page, treating transport failures and non-2xx responses alike
/// as a failed navigation attempt.
pub(crate) async fn fetch_ok(session: &PortalSession, url: &str) -> Result<Page, String> {
    let page = session.fetch(url).await.map_err(|e| e.to_string())?;
    if page.is_success() {
        Ok(page)
    } else {
        Err(format!("HTTP {} from {}", page.status, page.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn cookies_persist_across_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "sid=abc; Path=/")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/home"))
            .and(header_exists("cookie"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
            .mount(&server)
            .await;

        let mut session = PortalSession::new(server.uri(), Duration::from_secs(5)).unwrap();
        session.get(&format!("{}/login", server.uri())).await.unwrap();
        let page = session.get(&format!("{}/home", server.uri())).await.unwrap();

        assert!(page.is_success());
        assert_eq!(page.body, "welcome");
        assert_eq!(session.current().unwrap().body, "welcome");

        let fetched = session.fetch(&format!("{}/login", server.uri())).await.unwrap();
        assert_eq!(fetched.body, "<html></html>");
        assert_eq!(session.current().unwrap().body, "welcome");
    }

    #[tokio::test]
    async fn submit_posts_form_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(body_string_contains("user=alice"))
            .and(body_string_contains("pass=s%3Dcret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = PortalSession::new(server.uri(), Duration::from_secs(5)).unwrap();
        let form = LoginForm {
            action: Url::parse(&format!("{}/session", server.uri())).unwrap(),
            is_get: false,
            username_field: "user".into(),
            password_field: "pass".into(),
            hidden: vec![],
        };
        let page = session
            .submit(&form, &form.fields("alice", "s=cret"))
            .await
            .unwrap();
        assert_eq!(page.body, "ok");
    }

    #[tokio::test]
    async fn closed_session_rejects_requests() {
        let mut session = PortalSession::new("http://portal.test", Duration::from_secs(5)).unwrap();
        session.close();
        session.close();
        assert!(session.is_closed());

        let err = session.get("http://portal.test/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::SessionClosed { .. }));
    }

    #[test]
    fn page_url_matching_is_case_insensitive() {
        let page = Page {
            url: Url::parse("https://portal.test/Account/SignIn").unwrap(),
            status: 200,
            body: String::new(),
        };
        assert!(page.url_contains("signin"));
        assert!(!page.url_contains("login"));
    }
}
