//! Sync configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/portalsync/config.toml` by default.
//!
//! `password` supports secret references:
//! - `pass::path/in/store` - first line of `pass show path/in/store`
//! - `env::VAR_NAME` - the value of `$VAR_NAME`
//! - anything else - used as-is

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use portalsync_scrapers::{RetryPolicy, ScraperConfig};
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialCipher;
use crate::error::{ConfigError, SyncResult};

const APP_DIR: &str = "portalsync";

/// Configuration for one portal account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub portal_url: String,

    /// Adapter identifier, e.g. "ShinePartners" or "MockPortal".
    pub portal_type: String,

    pub username: String,

    /// Plain password or a secret reference.
    pub password: Option<String>,

    /// Output of [`CredentialCipher::encrypt`]; wins over `password`.
    pub password_encrypted: Option<String>,

    /// Emails invited to newly created events.
    pub family_attendees: Vec<String>,

    /// Daily sync time, `HH:MM` local time.
    pub sync_time: String,

    /// When false a run does nothing.
    pub enabled: bool,

    /// Where lock files live.
    pub state_dir: PathBuf,

    /// Google token file.
    pub google_credentials_path: PathBuf,

    /// How many upcoming events to list for deduplication.
    pub max_events: usize,

    pub calendar_id: String,

    pub navigation: NavigationSettings,
}

/// Portal navigation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// Attempts per page load, including the first.
    pub max_attempts: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            portal_url: String::new(),
            portal_type: "ShinePartners".to_string(),
            username: String::new(),
            password: None,
            password_encrypted: None,
            family_attendees: Vec::new(),
            sync_time: "09:00".to_string(),
            enabled: true,
            state_dir: Self::default_data_dir(),
            google_credentials_path: Self::default_config_dir().join("google-token.json"),
            max_events: 100,
            calendar_id: "primary".to_string(),
            navigation: NavigationSettings::default(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("SyncConfig")
            .field("portal_url", &self.portal_url)
            .field("portal_type", &self.portal_type)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("password_encrypted", &redacted(&self.password_encrypted))
            .field("family_attendees", &self.family_attendees)
            .field("sync_time", &self.sync_time)
            .field("enabled", &self.enabled)
            .field("state_dir", &self.state_dir)
            .field("google_credentials_path", &self.google_credentials_path)
            .field("max_events", &self.max_events)
            .field("calendar_id", &self.calendar_id)
            .field("navigation", &self.navigation)
            .finish()
    }
}

impl SyncConfig {
    /// Loads configuration from the default path, or defaults when the file
    /// does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// The parsed `sync_time`.
    pub fn sync_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.sync_time.trim(), "%H:%M").map_err(|_| {
            ConfigError::Invalid(format!(
                "sync_time must be HH:MM, got {:?}",
                self.sync_time
            ))
        })
    }

    /// Checks the options a run needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync_time()?;
        if !self.enabled {
            return Ok(());
        }

        let blank = |v: &str| v.trim().is_empty();
        if blank(&self.portal_url) {
            return Err(ConfigError::Invalid("portal_url is required".into()));
        }
        if blank(&self.username) {
            return Err(ConfigError::Invalid("username is required".into()));
        }
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !blank(s));
        if !has(&self.password) && !has(&self.password_encrypted) {
            return Err(ConfigError::Invalid(
                "one of password or password_encrypted is required".into(),
            ));
        }
        Ok(())
    }

    /// Returns the plaintext portal password.
    pub fn resolve_password(&self, cipher: &CredentialCipher) -> SyncResult<String> {
        if let Some(encrypted) = self.password_encrypted.as_deref()
            && !encrypted.trim().is_empty()
        {
            return Ok(cipher.decrypt(encrypted)?);
        }
        match self.password.as_deref() {
            Some(value) if !value.is_empty() => Ok(resolve_secret(value)?),
            _ => Err(ConfigError::Invalid("no password configured".into()).into()),
        }
    }

    /// Connection settings for the portal adapter.
    pub fn scraper_config(&self, password: String) -> ScraperConfig {
        ScraperConfig::new(&self.portal_url, &self.username, password)
            .with_timeout(Duration::from_secs(self.navigation.timeout_secs))
            .with_retry(RetryPolicy::new(self.navigation.max_attempts))
    }
}

/// Resolves a value that may carry a `pass::` or `env::` prefix.
pub fn resolve_secret(value: &str) -> Result<String, ConfigError> {
    if let Some(path) = value.strip_prefix("pass::") {
        first_line_of_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var)
            .map_err(|_| ConfigError::Secret(format!("environment variable `{}` is not set", var)))
    } else {
        Ok(value.to_string())
    }
}

fn first_line_of_pass(path: &str) -> Result<String, ConfigError> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ConfigError::Secret(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        return Err(ConfigError::Secret(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Secret(format!("`pass show {}` produced no output", path)))
}
