//! Sync engine and daemon.
//!
//! This crate ties the portal scrapers to a calendar backend:
//! - Configuration loading with secret references
//! - Credential encryption for stored passwords
//! - Reconciliation of scraped appointments against existing events
//! - A single sync run with a per-account lock
//! - A daily scheduler driven by the `portalsync` binary
//!
//! # Example
//!
//! ```rust,no_run
//! use portalsync_calendar::InMemoryBackend;
//! use portalsync_sync::{CredentialCipher, KeySource, SyncConfig, SyncRun, registry_factory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::load()?;
//!     let cipher = CredentialCipher::new(&KeySource::from_env())?;
//!     let backend = InMemoryBackend::new();
//!
//!     let outcome = SyncRun::new(&config, &cipher, registry_factory(), &backend)
//!         .run()
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

mod config;
mod credentials;
mod error;
mod lock;
mod orchestrator;
mod reconcile;
mod scheduler;
mod signals;

pub use config::{NavigationSettings, SyncConfig, resolve_secret};
pub use credentials::{
    CredentialCipher, Credentials, DEFAULT_KEY_IDENTIFIER, KEY_ENV, KeySource, hash_hex,
    verify_hash,
};
pub use error::{ConfigError, CryptoError, SyncError, SyncResult};
pub use lock::RunLock;
pub use orchestrator::{ScraperFactory, SyncOutcome, SyncRun, SyncSummary, registry_factory};
pub use reconcile::{EventIndex, ReconcileOutcome, ReconcileReport, Reconciler};
pub use scheduler::{DailySchedule, ScheduleConfig, SchedulerState};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
