use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::spotify::models::{
    ApiPlaylist, ApiUser, CreatedPlaylist, NewPlaylist, Page, SimplifiedPlaylist,
};

pub mod api;
pub mod models;
pub mod pagination;

#[cfg(test)]
pub mod fake;

#[derive(Debug)]
pub struct SpotifyError;

impl fmt::Display for SpotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Spotify error")
    }
}

impl std::error::Error for SpotifyError {}

pub type SpotifyResult<T> = error_stack::Result<T, SpotifyError>;

/// The remote calls the backup workflow depends on. [`api::SpotifyApi`] talks to the
/// Web API; tests use an in-memory fake.
#[async_trait]
pub trait SpotifyRemote: Sync {
    async fn current_user(&self) -> SpotifyResult<ApiUser>;

    /// First page of the current user's playlists.
    async fn current_user_playlists(&self) -> SpotifyResult<Page<SimplifiedPlaylist>>;

    /// The playlist with the first page of its items embedded.
    async fn playlist(&self, playlist_id: &str) -> SpotifyResult<ApiPlaylist>;

    /// Follows a page's `next` URL.
    async fn next_page<T>(&self, next_url: &str) -> SpotifyResult<Page<T>>
    where
        T: DeserializeOwned + Send + 'static;

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> SpotifyResult<CreatedPlaylist>;

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> SpotifyResult<()>;
}
