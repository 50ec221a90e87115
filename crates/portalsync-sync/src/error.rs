//! Sync error types.

use std::io;
use std::path::PathBuf;

use portalsync_calendar::CalendarError;
use portalsync_scrapers::ScrapeError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A required option is missing or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A `pass::` or `env::` reference could not be resolved.
    #[error("failed to resolve secret: {0}")]
    Secret(String),
}

/// Credential encryption and encoding errors.
///
/// Messages never include key material or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("cannot encrypt empty plaintext")]
    EmptyPlaintext,

    #[error("cannot decrypt empty data")]
    EmptyCiphertext,

    #[error("encryption key must be 32 bytes, got {0}")]
    KeyLength(usize),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("encrypted payload is too short ({0} bytes)")]
    Truncated(usize),

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key or tampered data.
    #[error("decryption failed: authentication tag mismatch")]
    Decrypt,

    #[error("decrypted data is not valid UTF-8")]
    Utf8,

    #[error("invalid credentials payload: {0}")]
    Payload(String),
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A scrape stage failed, or the portal type is unsupported.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Existing events could not be listed.
    #[error("failed to list existing calendar events: {0}")]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Another run holds the lock for the same portal account.
    #[error("a sync for this portal account is already running (lock file: {lock_path})")]
    AlreadyRunning { lock_path: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Creates an already running error.
    pub fn already_running(lock_path: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            lock_path: lock_path.into(),
        }
    }

    /// The portal URL involved, when the failure came from a scrape stage.
    pub fn portal_url(&self) -> Option<&str> {
        match self {
            Self::Scrape(e) => e.portal_url(),
            _ => None,
        }
    }

    /// The failing stage, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Scrape(e) => e.stage(),
            Self::Calendar(_) => "list-events",
            Self::Config(_) => "config",
            Self::Crypto(_) => "credentials",
            Self::AlreadyRunning { .. } | Self::Io(_) => "lock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_errors_keep_portal_context() {
        let err = SyncError::from(ScrapeError::auth("https://portal.test", "bad password"));
        assert_eq!(err.portal_url(), Some("https://portal.test"));
        assert_eq!(err.stage(), "authenticate");
        assert_eq!(
            err.to_string(),
            "authentication failed for https://portal.test: bad password"
        );
    }

    #[test]
    fn already_running_display() {
        let err = SyncError::already_running("/tmp/x.lock");
        assert!(err.to_string().contains("/tmp/x.lock"));
        assert!(err.portal_url().is_none());
    }
}
