//! portalsync daemon entry point.
//!
//! Configuration comes from `config.toml` (or the file named by
//! `PORTALSYNC_CONFIG`); logging is chosen with `PORTALSYNC_LOG_JSON` and
//! `PORTALSYNC_DEBUG`, and `RUST_LOG` overrides the level.

use std::path::Path;
use std::process::ExitCode;
#[cfg(feature = "google")]
use std::time::Duration;

use portalsync_calendar::{CalendarBackend, ErrorBackend};
use portalsync_core::{TracingConfig, init_tracing};
use portalsync_sync::{
    CredentialCipher, DailySchedule, KeySource, RunLock, ScheduleConfig, SignalHandler,
    SyncConfig, SyncOutcome, SyncResult, SyncRun, registry_factory,
};
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "PORTALSYNC_CONFIG";
const LOG_JSON_ENV: &str = "PORTALSYNC_LOG_JSON";
const DEBUG_ENV: &str = "PORTALSYNC_DEBUG";

#[tokio::main]
async fn main() -> ExitCode {
    let tracing = if std::env::var_os(LOG_JSON_ENV).is_some() {
        TracingConfig::daemon()
    } else if std::env::var_os(DEBUG_ENV).is_some() {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SyncResult<()> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => SyncConfig::load_from(Path::new(&path))?,
        None => SyncConfig::load()?,
    };
    config.validate()?;
    let sync_time = config.sync_time()?;
    let cipher = CredentialCipher::new(&KeySource::from_env())?;
    info!(
        portal = %config.portal_url,
        portal_type = %config.portal_type,
        enabled = config.enabled,
        "configuration loaded"
    );

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let config = &config;
    let cipher = &cipher;
    DailySchedule::new(ScheduleConfig::new(sync_time))
        .run(signals.shutdown_handle(), move || sync_once(config, cipher))
        .await;
    Ok(())
}

/// One locked sync run; the error string feeds the scheduler's backoff.
async fn sync_once(config: &SyncConfig, cipher: &CredentialCipher) -> Result<(), String> {
    let _lock = RunLock::acquire(&config.state_dir, config).map_err(|e| e.to_string())?;
    let backend = calendar_backend(config);

    match SyncRun::new(config, cipher, registry_factory(), backend.as_ref())
        .run()
        .await
    {
        Ok(SyncOutcome::Disabled) => Ok(()),
        Ok(SyncOutcome::Completed(summary)) => {
            info!(
                scraped = summary.scraped,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                dropped = summary.dropped,
                "sync run finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                portal = e.portal_url().unwrap_or(&config.portal_url),
                stage = e.stage(),
                error = %e,
                "sync run failed"
            );
            Err(e.to_string())
        }
    }
}

/// Builds the calendar backend for one run.
///
/// The token file is re-read every run so an externally refreshed token is
/// picked up without a restart.
#[cfg(feature = "google")]
fn calendar_backend(config: &SyncConfig) -> Box<dyn CalendarBackend> {
    use portalsync_calendar::google::GoogleCalendarBackend;

    match GoogleCalendarBackend::from_token_file(
        &config.google_credentials_path,
        config.calendar_id.clone(),
        Duration::from_secs(config.navigation.timeout_secs),
    ) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            warn!(
                path = %config.google_credentials_path.display(),
                error = %e,
                "Google Calendar is not available"
            );
            Box::new(ErrorBackend::new("google", e))
        }
    }
}

#[cfg(not(feature = "google"))]
fn calendar_backend(_config: &SyncConfig) -> Box<dyn CalendarBackend> {
    warn!("built without a calendar backend");
    Box::new(ErrorBackend::new(
        "none",
        portalsync_calendar::CalendarError::configuration("no calendar backend compiled in"),
    ))
}
