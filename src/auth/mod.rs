use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use error_stack::{IntoReport, ResultExt};
use serde::{Deserialize, Serialize};

pub mod spotify_auth;

#[derive(Debug)]
pub struct AuthError;

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authentication error")
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = error_stack::Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: String,
}

impl CachedToken {
    /// Tokens this close to expiry are treated as expired.
    const EXPIRY_MARGIN_SECS: i64 = 60;

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(Self::EXPIRY_MARGIN_SECS) <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// One token cache file per account, passed explicitly to whoever needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    const FILE_PREFIX: &'static str = ".spotify-token-cache";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `.spotify-token-cache` for the default account, `.spotify-token-cache-<name>` otherwise.
    pub fn for_account(account: Option<&str>) -> Self {
        let file_name = match account {
            Some(name) => format!("{}-{}", Self::FILE_PREFIX, name),
            None => Self::FILE_PREFIX.to_string(),
        };
        Self::new(file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AuthResult<Option<CachedToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .into_report()
            .change_context(AuthError)
            .attach_printable(format!(
                "Failed to read token cache at {}",
                self.path.display()
            ))?;
        match serde_json::from_str::<CachedToken>(&content) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                log::warn!(
                    "ignoring unreadable token cache {}: {}",
                    self.path.display(),
                    err
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, token: &CachedToken) -> AuthResult<()> {
        let serialized = serde_json::to_string_pretty(token)
            .into_report()
            .change_context(AuthError)?;
        fs::write(&self.path, serialized)
            .into_report()
            .change_context(AuthError)
            .attach_printable(format!(
                "Failed to write token cache at {}",
                self.path.display()
            ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: DateTime<Utc>) -> CachedToken {
        CachedToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            scope: "playlist-read-private".to_string(),
        }
    }

    #[test]
    fn test_cache_file_per_account() {
        assert_eq!(
            TokenCache::for_account(None).path(),
            Path::new(".spotify-token-cache")
        );
        assert_eq!(
            TokenCache::for_account(Some("alice")).path(),
            Path::new(".spotify-token-cache-alice")
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("cache"));
        assert_eq!(cache.load().unwrap(), None);

        let saved = token(Utc::now() + Duration::hours(1));
        cache.save(&saved).unwrap();
        assert_eq!(cache.load().unwrap(), Some(saved));
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        fs::write(&path, "not json").unwrap();
        assert_eq!(TokenCache::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_expiry_margin() {
        let now = Utc::now();
        assert!(token(now + Duration::seconds(30)).is_expired_at(now));
        assert!(!token(now + Duration::minutes(10)).is_expired_at(now));
    }
}
