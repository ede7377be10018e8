use std::{env, fmt};

use error_stack::{IntoReport, Report, ResultExt};
use url::Url;

use crate::Suggestion;

#[derive(Debug)]
pub struct ConfigError;

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Configuration error")
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = error_stack::Result<T, ConfigError>;

/// `AppConfig` holds the values the Spotify authorization flow needs,
/// read from the environment (or a `.env` file) before any network call.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
}

impl AppConfig {
    pub const CLIENT_ID_VAR: &'static str = "SPOTIFY_CLIENT_ID";
    pub const CLIENT_SECRET_VAR: &'static str = "SPOTIFY_CLIENT_SECRET";
    pub const REDIRECT_URI_VAR: &'static str = "SPOTIFY_REDIRECT_URI";

    /// Older `SPOTIPY_*` spellings, read when the `SPOTIFY_*` name is unset.
    pub const LEGACY_CLIENT_ID_VAR: &'static str = "SPOTIPY_CLIENT_ID";
    pub const LEGACY_CLIENT_SECRET_VAR: &'static str = "SPOTIPY_CLIENT_SECRET";
    pub const LEGACY_REDIRECT_URI_VAR: &'static str = "SPOTIPY_REDIRECT_URI";

    pub const AUTH_URL: &'static str = "https://accounts.spotify.com/authorize";
    pub const TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";
    pub const API_BASE_URL: &'static str = "https://api.spotify.com/v1";

    /// Scopes needed to read every playlist and to create new ones.
    pub const SCOPES: [&'static str; 4] = [
        "playlist-read-private",
        "playlist-read-collaborative",
        "playlist-modify-public",
        "playlist-modify-private",
    ];

    pub const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 300;

    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str, legacy: &str| {
            [name, legacy]
                .into_iter()
                .find_map(|var| lookup(var).filter(|value| !value.trim().is_empty()))
        };

        let client_id = read(Self::CLIENT_ID_VAR, Self::LEGACY_CLIENT_ID_VAR);
        let redirect_uri = read(Self::REDIRECT_URI_VAR, Self::LEGACY_REDIRECT_URI_VAR);
        let missing = [
            (Self::CLIENT_ID_VAR, client_id.is_none()),
            (Self::REDIRECT_URI_VAR, redirect_uri.is_none()),
        ]
        .iter()
        .filter(|(_, is_missing)| *is_missing)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();

        let (Some(client_id), Some(redirect_uri)) = (client_id, redirect_uri) else {
            return Err(Report::new(ConfigError)
                .attach_printable(format!(
                    "missing environment variables: {}",
                    missing.join(", ")
                ))
                .attach(Suggestion(
                    "Set them in your shell or add them to a .env file.".to_string(),
                )));
        };

        let redirect_uri = Url::parse(&redirect_uri)
            .into_report()
            .change_context(ConfigError)
            .attach_printable(format!(
                "{} is not a valid URL: {}",
                Self::REDIRECT_URI_VAR,
                redirect_uri
            ))?;

        Ok(Self {
            client_id,
            client_secret: read(Self::CLIENT_SECRET_VAR, Self::LEGACY_CLIENT_SECRET_VAR),
            redirect_uri,
        })
    }

    pub fn scope_string() -> String {
        Self::SCOPES.join(" ")
    }
}
