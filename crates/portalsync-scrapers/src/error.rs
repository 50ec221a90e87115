//! Scraper error types.

use thiserror::Error;

use crate::contract::ScraperState;

/// Failure of one scrape stage or of adapter selection.
///
/// Stage errors carry the portal URL so an operator can tell which
/// configuration failed.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Bad credentials or an unrecognised login form.
    #[error("authentication failed for {portal_url}: {message}")]
    Auth { portal_url: String, message: String },

    /// The target page could not be reached after bounded retries.
    #[error("navigation to {url} failed after {attempts} attempt(s) (portal {portal_url}): {message}")]
    Navigation {
        portal_url: String,
        url: String,
        attempts: u32,
        message: String,
    },

    /// The appointments page did not have the expected structure.
    #[error("extraction failed for {portal_url}: {message}")]
    Extraction { portal_url: String, message: String },

    /// Neither the portal type nor the URL names a supported adapter.
    #[error(
        "unsupported portal type: {portal_type} ({portal_url}); supported types: {}",
        supported.join(", ")
    )]
    UnsupportedPortal {
        portal_type: String,
        portal_url: String,
        supported: Vec<&'static str>,
    },

    /// Transport failure outside of a retried navigation.
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A transition was called out of order.
    #[error("invalid scraper state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ScraperState,
        actual: ScraperState,
    },

    /// The session was used after `close()`.
    #[error("portal session for {portal_url} is closed")]
    SessionClosed { portal_url: String },
}

impl ScrapeError {
    pub fn auth(portal_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            portal_url: portal_url.into(),
            message: message.into(),
        }
    }

    pub fn extraction(portal_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            portal_url: portal_url.into(),
            message: message.into(),
        }
    }

    /// The stage that failed, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "authenticate",
            Self::Navigation { .. } => "navigate",
            Self::Extraction { .. } => "extract",
            Self::UnsupportedPortal { .. } => "select",
            Self::Http { .. } | Self::SessionClosed { .. } => "transport",
            Self::InvalidState { .. } => "state",
        }
    }

    /// The portal URL involved, when known.
    pub fn portal_url(&self) -> Option<&str> {
        match self {
            Self::Auth { portal_url, .. }
            | Self::Navigation { portal_url, .. }
            | Self::Extraction { portal_url, .. }
            | Self::UnsupportedPortal { portal_url, .. }
            | Self::SessionClosed { portal_url } => Some(portal_url),
            Self::Http { .. } | Self::InvalidState { .. } => None,
        }
    }
}

/// A specialized Result type for scraper operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_portal_lists_supported_types() {
        let err = ScrapeError::UnsupportedPortal {
            portal_type: "MyChart".into(),
            portal_url: "https://example.org".into(),
            supported: vec!["ShinePartners", "MockPortal"],
        };
        assert_eq!(
            err.to_string(),
            "unsupported portal type: MyChart (https://example.org); supported types: ShinePartners, MockPortal"
        );
        assert_eq!(err.stage(), "select");
    }

    #[test]
    fn stage_errors_carry_portal_url() {
        let err = ScrapeError::Navigation {
            portal_url: "https://portal.test".into(),
            url: "https://portal.test/appointments".into(),
            attempts: 3,
            message: "HTTP 503".into(),
        };
        assert_eq!(err.portal_url(), Some("https://portal.test"));
        assert!(err.to_string().contains("after 3 attempt(s)"));

        let err = ScrapeError::auth("https://portal.test", "bad password");
        assert_eq!(err.stage(), "authenticate");
    }

    #[test]
    fn invalid_state_display() {
        let err = ScrapeError::InvalidState {
            expected: ScraperState::Authenticated,
            actual: ScraperState::Idle,
        };
        assert_eq!(
            err.to_string(),
            "invalid scraper state: expected authenticated, found idle"
        );
        assert!(err.portal_url().is_none());
    }
}
