//! Adapter selection.
//!
//! A portal type identifier picks the adapter directly. When the identifier
//! is unknown or names a portal without an adapter, the portal URL is
//! matched against known substrings.

use std::fmt;

use tracing::{info, warn};

use crate::adapters::{MockPortalScraper, ShinePartnersScraper};
use crate::contract::{PortalScraper, ScraperConfig};
use crate::error::{ScrapeError, ScrapeResult};

/// Portals the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalKind {
    ShinePartners,
    MockPortal,
    MyChart,
    Cerner,
    AthenaHealth,
    Epic,
}

impl PortalKind {
    pub const ALL: [PortalKind; 6] = [
        Self::ShinePartners,
        Self::MockPortal,
        Self::MyChart,
        Self::Cerner,
        Self::AthenaHealth,
        Self::Epic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShinePartners => "ShinePartners",
            Self::MockPortal => "MockPortal",
            Self::MyChart => "MyChart",
            Self::Cerner => "Cerner",
            Self::AthenaHealth => "AthenaHealth",
            Self::Epic => "Epic",
        }
    }

    /// Case-insensitive lookup of a canonical identifier.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(identifier))
    }

    /// Guesses the portal from its URL. Order matters: local and mock
    /// hosts win over everything else, and MyChart is checked before the
    /// generic Epic "chart" match.
    pub fn detect_from_url(url: &str) -> Option<Self> {
        let url = url.to_lowercase();
        let has = |needle: &str| url.contains(needle);

        if has("localhost") || has("127.0.0.1") || has("mock") {
            Some(Self::MockPortal)
        } else if has("shinepartners.ca") {
            Some(Self::ShinePartners)
        } else if has("mychart") {
            Some(Self::MyChart)
        } else if has("cerner") || has("powerchart") || has("healtheintent") {
            Some(Self::Cerner)
        } else if has("athena") {
            Some(Self::AthenaHealth)
        } else if has("epic") || has("chart") {
            Some(Self::Epic)
        } else {
            None
        }
    }

    /// True when an adapter exists for this portal.
    pub fn has_adapter(&self) -> bool {
        matches!(self, Self::ShinePartners | Self::MockPortal)
    }

    fn build(self, config: ScraperConfig) -> ScrapeResult<Box<dyn PortalScraper>> {
        match self {
            Self::ShinePartners => Ok(Box::new(ShinePartnersScraper::new(config)?)),
            Self::MockPortal => Ok(Box::new(MockPortalScraper::new(config)?)),
            other => Err(unsupported(other.as_str(), &config.portal_url)),
        }
    }
}

impl fmt::Display for PortalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers that have an adapter.
pub fn supported_portal_types() -> Vec<&'static str> {
    PortalKind::ALL
        .into_iter()
        .filter(PortalKind::has_adapter)
        .map(|kind| kind.as_str())
        .collect()
}

fn unsupported(portal_type: &str, portal_url: &str) -> ScrapeError {
    ScrapeError::UnsupportedPortal {
        portal_type: portal_type.to_string(),
        portal_url: portal_url.to_string(),
        supported: supported_portal_types(),
    }
}

/// Resolves the adapter kind for `portal_type` and `portal_url`.
pub fn resolve(portal_type: &str, portal_url: &str) -> ScrapeResult<PortalKind> {
    if let Some(kind) = PortalKind::from_identifier(portal_type)
        && kind.has_adapter()
    {
        return Ok(kind);
    }

    warn!(
        portal_type,
        available = ?supported_portal_types(),
        "unknown portal type, trying URL detection"
    );
    match PortalKind::detect_from_url(portal_url) {
        Some(kind) if kind.has_adapter() => {
            info!(detected = %kind, "auto-detected portal type");
            Ok(kind)
        }
        _ => Err(unsupported(portal_type, portal_url)),
    }
}

/// Builds the adapter for `portal_type`, falling back to URL detection.
pub fn create_scraper(
    portal_type: &str,
    config: ScraperConfig,
) -> ScrapeResult<Box<dyn PortalScraper>> {
    let kind = resolve(portal_type, &config.portal_url)?;
    info!(portal_type = %kind, "creating scraper");
    kind.build(config)
}
