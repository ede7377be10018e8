use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use error_stack::{IntoReport, Report, ResultExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use crate::config::AppConfig;
use crate::spotify::models::{
    ApiPlaylist, ApiUser, CreatedPlaylist, NewPlaylist, Page, SimplifiedPlaylist,
};
use crate::spotify::{SpotifyError, SpotifyRemote, SpotifyResult};

/// Why a single HTTP attempt did not produce a usable response.
#[derive(Debug)]
enum AttemptError {
    Transport(reqwest::Error),
    Status {
        status: StatusCode,
        retry_after: Option<Duration>,
    },
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Transport(err) => {
                err.is_connect()
                    || err.is_timeout()
                    || err.is_request()
                    || err.is_body()
                    || err.is_decode()
            }
            AttemptError::Status { .. } => true,
        }
    }

    /// How long the server asked us to wait, if it did.
    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptError::Status { retry_after, .. } => *retry_after,
            AttemptError::Transport(_) => None,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(err) => write!(f, "request failed: {err}"),
            AttemptError::Status { status, .. } => write!(f, "server answered {status}"),
        }
    }
}

/// `Retry-After` in its delay-seconds form.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    let seconds = response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(seconds))
}

/// Bearer-authenticated client for the playlist endpoints of the Spotify Web API.
pub struct SpotifyApi {
    http: reqwest::Client,
    access_token: String,
    base_url: Url,
    backoff: ExponentialBuilder,
}

impl SpotifyApi {
    const PLAYLISTS_PAGE_LIMIT: u32 = 50;
    const MAX_RETRIES: usize = 3;
    const RETRYABLE_STATUSES: [StatusCode; 5] = [
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::BAD_GATEWAY,
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::GATEWAY_TIMEOUT,
    ];

    pub fn new(access_token: String) -> SpotifyResult<Self> {
        let base_url = Url::parse(AppConfig::API_BASE_URL)
            .into_report()
            .change_context(SpotifyError)?;
        Ok(Self {
            http: reqwest::Client::new(),
            access_token,
            base_url,
            backoff: ExponentialBuilder::default()
                .with_jitter()
                .with_max_times(Self::MAX_RETRIES),
        })
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> SpotifyResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Report::new(SpotifyError).attach_printable("API base URL cannot take a path")
            })?
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and returns the response body. Retryable failures,
    /// including a body cut off mid-read, are retried; a `Retry-After` on the
    /// response stretches the next delay to at least that long.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> SpotifyResult<String> {
        log::debug!("{method} {url}");
        let method_ref = &method;
        let attempt = || async move {
            let mut request = self
                .http
                .request(method_ref.clone(), url)
                .bearer_auth(&self.access_token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(AttemptError::Transport)?;
            let status = response.status();
            if Self::RETRYABLE_STATUSES.contains(&status) {
                return Err(AttemptError::Status {
                    status,
                    retry_after: retry_after(&response),
                });
            }
            let text = response.text().await.map_err(AttemptError::Transport)?;
            Ok((status, text))
        };

        let (status, text) = attempt
            .retry(self.backoff.clone())
            .when(AttemptError::is_retryable)
            .adjust(|err, delay| {
                delay.map(|delay| err.retry_after().map_or(delay, |wait| wait.max(delay)))
            })
            .notify(|err, delay| {
                if err.retry_after().is_some() {
                    log::warn!("rate limited on {url}, waiting {delay:?}");
                } else {
                    log::debug!("retrying {url} in {delay:?}: {err}");
                }
            })
            .await
            .map_err(|err| {
                Report::new(SpotifyError).attach_printable(format!("{method} {url}: {err}"))
            })?;

        if !status.is_success() {
            return Err(Report::new(SpotifyError)
                .attach_printable(format!("{method} {url} returned {status}: {text}")));
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SpotifyResult<T> {
        let text = self.send(Method::GET, url, None).await?;
        serde_json::from_str(&text)
            .into_report()
            .change_context(SpotifyError)
            .attach_printable(format!("Unexpected response body from {url}"))
    }
}

#[async_trait]
impl SpotifyRemote for SpotifyApi {
    async fn current_user(&self) -> SpotifyResult<ApiUser> {
        let url = self.endpoint(&["me"])?;
        self.get_json(url.as_str()).await
    }

    async fn current_user_playlists(&self) -> SpotifyResult<Page<SimplifiedPlaylist>> {
        let mut url = self.endpoint(&["me", "playlists"])?;
        url.query_pairs_mut()
            .append_pair("limit", &Self::PLAYLISTS_PAGE_LIMIT.to_string());
        self.get_json(url.as_str()).await
    }

    async fn playlist(&self, playlist_id: &str) -> SpotifyResult<ApiPlaylist> {
        let mut url = self.endpoint(&["playlists", playlist_id])?;
        url.query_pairs_mut().append_pair("additional_types", "track");
        self.get_json(url.as_str()).await
    }

    async fn next_page<T>(&self, next_url: &str) -> SpotifyResult<Page<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.get_json(next_url).await
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> SpotifyResult<CreatedPlaylist> {
        let url = self.endpoint(&["users", user_id, "playlists"])?;
        let body = serde_json::to_value(playlist)
            .into_report()
            .change_context(SpotifyError)?;
        let text = self.send(Method::POST, url.as_str(), Some(&body)).await?;
        serde_json::from_str::<CreatedPlaylist>(&text)
            .into_report()
            .change_context(SpotifyError)
            .attach_printable("Unexpected response body when creating a playlist")
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> SpotifyResult<()> {
        let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        let body = json!({ "uris": uris });
        self.send(Method::POST, url.as_str(), Some(&body)).await?;
        Ok(())
    }
}
