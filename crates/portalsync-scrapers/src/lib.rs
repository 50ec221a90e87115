//! Portal scraping.
//!
//! - [`PortalScraper`] - the authenticate/navigate/extract contract and [`scrape`]
//! - [`registry`] - portal type lookup and URL detection
//! - [`adapters`] - `MockPortal` and `ShinePartners`
//! - [`retry`] - bounded navigation retry
//!
//! Adapters only read rows off the page; date and time parsing happen in
//! `portalsync-core`.

pub mod adapters;
pub mod contract;
pub mod error;
pub mod html;
pub mod registry;
pub mod retry;
pub mod session;

pub use contract::{BoxFuture, PortalScraper, ScraperConfig, ScraperState, scrape};
pub use error::{ScrapeError, ScrapeResult};
pub use registry::{PortalKind, create_scraper, supported_portal_types};
pub use retry::{RetryPolicy, retry_navigation};
