//! OAuth token file loading.
//!
//! The token file is provisioned out of band; this module only reads it and
//! checks that the access token is still usable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CalendarError, CalendarResult};

/// An OAuth token set as persisted on disk.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl TokenInfo {
    /// Returns true if the access token is past its expiry.
    ///
    /// Tokens without an expiry are treated as valid.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }
}

/// A token file on disk.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default token location: `<config dir>/portalsync/google-token.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portalsync").join("google-token.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the token file.
    pub fn load(&self) -> CalendarResult<TokenInfo> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Err(CalendarError::configuration(format!(
                "Google credentials file not found: {}",
                self.path.display()
            )));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            CalendarError::configuration(format!("failed to read token file: {}", e))
                .with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            CalendarError::configuration(format!("failed to parse token file: {}", e))
                .with_source(e)
        })?;

        info!(path = %self.path.display(), "loaded Google tokens");
        Ok(tokens)
    }

    /// Loads the token file and rejects an expired access token.
    pub fn load_valid(&self) -> CalendarResult<TokenInfo> {
        let tokens = self.load()?;
        if tokens.is_expired() {
            return Err(CalendarError::authentication(format!(
                "access token in {} has expired; re-authorize the calendar",
                self.path.display()
            )));
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarErrorCode;
    use chrono::Duration;
    use tempfile::TempDir;

    fn write_token(dir: &TempDir, expires_at: Option<DateTime<Utc>>) -> PathBuf {
        let path = dir.path().join("token.json");
        let token = TokenInfo {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            expires_at,
            scopes: vec!["https://www.googleapis.com/auth/calendar".into()],
        };
        fs::write(&path, serde_json::to_string(&token).unwrap()).unwrap();
        path
    }

    #[test]
    fn loads_valid_token() {
        let dir = TempDir::new().unwrap();
        let path = write_token(&dir, Some(Utc::now() + Duration::hours(1)));

        let tokens = TokenStorage::new(&path).load_valid().unwrap();
        assert_eq!(tokens.access_token, "secret-access");
        assert!(!tokens.is_expired());
    }

    #[test]
    fn expired_token_is_an_authentication_error() {
        let dir = TempDir::new().unwrap();
        let path = write_token(&dir, Some(Utc::now() - Duration::hours(1)));

        let err = TokenStorage::new(&path).load_valid().unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::AuthenticationFailed);
    }

    #[test]
    fn missing_or_corrupt_file_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        let missing = TokenStorage::new(dir.path().join("nope.json"));
        assert_eq!(
            missing.load().unwrap_err().code(),
            CalendarErrorCode::ConfigurationError
        );

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();
        assert_eq!(
            TokenStorage::new(&corrupt).load().unwrap_err().code(),
            CalendarErrorCode::ConfigurationError
        );
    }

    #[test]
    fn debug_redacts_tokens() {
        let token = TokenInfo {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            expires_at: None,
            scopes: vec![],
        };
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert!(!token.is_expired());
    }
}
