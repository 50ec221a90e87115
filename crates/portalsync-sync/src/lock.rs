//! Run lock for a portal account.
//!
//! A sync run holds a lock file in the state directory for its whole
//! duration, so two runs for the same portal account never reconcile against
//! the calendar at the same time. The file holds the owner's PID and is
//! removed on drop.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::credentials::hash_hex;
use crate::error::{SyncError, SyncResult};

/// Exclusive lock held for one sync run.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquires the lock for the account described by `config`.
    ///
    /// Returns [`SyncError::AlreadyRunning`] if a live process holds it.
    pub fn acquire(state_dir: &Path, config: &SyncConfig) -> SyncResult<Self> {
        Self::acquire_at(Self::lock_path(state_dir, config))
    }

    /// Lock file path for an account: `sync-<sha256(portal_url + username)>.lock`.
    pub fn lock_path(state_dir: &Path, config: &SyncConfig) -> PathBuf {
        let digest = hash_hex(&format!("{}{}", config.portal_url, config.username));
        state_dir.join(format!("sync-{}.lock", digest))
    }

    fn acquire_at(path: PathBuf) -> SyncResult<Self> {
        if path.exists() {
            match Self::read_pid(&path) {
                Some(pid) if Self::is_process_running(pid) => {
                    return Err(SyncError::already_running(path.to_string_lossy()));
                }
                Some(pid) => {
                    warn!(path = %path.display(), pid, "Removing stale run lock");
                    fs::remove_file(&path)?;
                }
                None => {
                    warn!(path = %path.display(), "Removing invalid run lock");
                    fs::remove_file(&path)?;
                }
            }
        }

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        // create_new loses the race against a concurrent acquirer instead of
        // overwriting its lock.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SyncError::already_running(path.to_string_lossy()));
            }
            Err(e) => return Err(e.into()),
        };
        let pid = process::id();
        writeln!(file, "{}", pid)?;
        file.sync_all()?;

        info!(path = %path.display(), pid, "Acquired run lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_pid(path: &Path) -> Option<u32> {
        let mut contents = String::new();
        File::open(path).ok()?.read_to_string(&mut contents).ok()?;
        contents.trim().parse::<u32>().ok()
    }

    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        // Signal 0 only checks that the process exists.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    fn is_process_running(_pid: u32) -> bool {
        true
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove run lock");
        } else {
            debug!(path = %self.path.display(), "Released run lock");
        }
    }
}
