//! Daily sync scheduler.
//!
//! Runs a sync immediately, then once a day at the configured local time.
//! A failed sync is retried with exponential backoff until one succeeds,
//! after which the daily rhythm resumes.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Utc};
use portalsync_core::format_duration;
use tracing::{debug, info, warn};

use crate::signals::ShutdownHandle;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily sync.
    pub sync_time: NaiveTime,
    /// Backoff after the first failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl ScheduleConfig {
    pub fn new(sync_time: NaiveTime) -> Self {
        Self {
            sync_time,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(3600),
            backoff_multiplier: 2.0,
        }
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates backoff delay based on consecutive failures.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_secs_f64();
        let multiplier = self
            .backoff_multiplier
            .powi(consecutive_failures.saturating_sub(1).min(i32::MAX as u32) as i32);
        let delay = base * multiplier;
        let max = self.max_backoff.as_secs_f64();

        Duration::from_secs_f64(delay.min(max))
    }

    /// Time from `now` until the next occurrence of `sync_time`: later today
    /// if it is still ahead, otherwise tomorrow.
    pub fn delay_until_next(&self, now: NaiveDateTime) -> Duration {
        let today = now.date().and_time(self.sync_time);
        let next = if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        };
        (next - now).to_std().unwrap_or_default()
    }
}

/// Outcome bookkeeping across runs.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub consecutive_failures: u32,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SchedulerState {
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_sync = Some(Utc::now());
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}

/// Runs syncs on a daily schedule until shutdown.
pub struct DailySchedule {
    config: ScheduleConfig,
    state: SchedulerState,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl DailySchedule {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            state: SchedulerState::default(),
            clock: local_now,
        }
    }

    /// Replaces the local wall clock used to compute the daily delay.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Delay before the next run given the current state.
    pub fn next_delay(&self) -> Duration {
        if self.state.consecutive_failures > 0 {
            self.config.backoff_delay(self.state.consecutive_failures)
        } else {
            self.config.delay_until_next((self.clock)())
        }
    }

    /// Runs `sync_fn` now and then on schedule until `shutdown` fires.
    ///
    /// A run in progress is never interrupted; shutdown is observed between
    /// runs.
    pub async fn run<F, Fut>(mut self, shutdown: ShutdownHandle, mut sync_fn: F) -> SchedulerState
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        info!(sync_time = %self.config.sync_time.format("%H:%M"), "Scheduler started");

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            self.do_sync(&mut sync_fn).await;

            let delay = self.next_delay();
            info!(
                failures = self.state.consecutive_failures,
                next_in = %format_duration((delay.as_secs() / 60) as i64),
                "Scheduling next sync"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait().wait() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
        self.state
    }

    async fn do_sync<F, Fut>(&mut self, sync_fn: &mut F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        debug!("Starting sync");
        match sync_fn().await {
            Ok(()) => {
                info!("Sync completed successfully");
                self.state.record_success();
            }
            Err(e) => {
                warn!(error = %e, failures = self.state.consecutive_failures + 1, "Sync failed");
                self.state.record_failure(e);
            }
        }
    }
}
