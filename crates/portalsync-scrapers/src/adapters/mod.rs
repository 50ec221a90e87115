//! Portal adapters.

pub mod mockportal;
pub mod shinepartners;

pub use mockportal::MockPortalScraper;
pub use shinepartners::ShinePartnersScraper;
