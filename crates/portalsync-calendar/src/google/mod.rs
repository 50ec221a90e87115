//! Google Calendar backend.
//!
//! Talks to the Calendar API v3 with a bearer token read from a provisioned
//! token file. Obtaining and refreshing that token happens outside this
//! crate; an expired token fails backend construction with an
//! authentication error.
//!
//! ```ignore
//! use portalsync_calendar::google::GoogleCalendarBackend;
//!
//! let backend = GoogleCalendarBackend::from_token_file(&path, "primary", timeout)?;
//! let events = backend.list_upcoming_events(100).await?;
//! ```

mod backend;
mod client;
mod tokens;

pub use backend::GoogleCalendarBackend;
pub use client::GoogleCalendarClient;
pub use tokens::{TokenInfo, TokenStorage};
