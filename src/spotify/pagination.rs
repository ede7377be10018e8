use std::collections::VecDeque;

use serde::de::DeserializeOwned;

use crate::spotify::models::{Page, SimplifiedPlaylist};
use crate::spotify::{SpotifyRemote, SpotifyResult};

/// Walks a paginated collection item by item, fetching the next page only
/// when the current one is exhausted. Failed fetches are returned as-is; the
/// remote client owns retrying.
pub struct PaginationWalker<'a, R, T> {
    remote: &'a R,
    buffered: VecDeque<T>,
    next_url: Option<String>,
    total: u32,
}

impl<'a, R, T> PaginationWalker<'a, R, T>
where
    R: SpotifyRemote,
    T: DeserializeOwned + Send + 'static,
{
    pub fn new(remote: &'a R, first_page: Page<T>) -> Self {
        Self {
            remote,
            buffered: first_page.items.into(),
            next_url: first_page.next,
            total: first_page.total,
        }
    }

    /// Item count announced by the first page.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub async fn next(&mut self) -> SpotifyResult<Option<T>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Ok(Some(item));
            }
            let Some(url) = self.next_url.take() else {
                return Ok(None);
            };
            let page = self.remote.next_page::<T>(&url).await?;
            self.next_url = page.next;
            self.buffered.extend(page.items);
        }
    }

    pub async fn collect_all(mut self) -> SpotifyResult<Vec<T>> {
        let mut items = Vec::with_capacity(self.total as usize);
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Every playlist of the current user, in the order the API lists them.
pub async fn list_playlists<R: SpotifyRemote>(
    remote: &R,
) -> SpotifyResult<Vec<SimplifiedPlaylist>> {
    let first_page = remote.current_user_playlists().await?;
    PaginationWalker::new(remote, first_page).collect_all().await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::spotify::fake::FakeSpotify;
    use crate::spotify::models::PlaylistItem;

    #[tokio::test]
    async fn test_walks_every_page_in_order() {
        let remote = FakeSpotify::new().with_playlists(120, 50);
        let playlists = list_playlists(&remote).await.unwrap();

        assert_eq!(playlists.len(), 120);
        let names = playlists.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
        let expected = (1..=120).map(|i| format!("Playlist {i}")).collect::<Vec<_>>();
        assert_eq!(names, expected);
        assert_eq!(remote.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_single_page_makes_no_extra_call() {
        let remote = FakeSpotify::new();
        let first_page: Page<PlaylistItem> = serde_json::from_value(json!({
            "items": [{ "added_at": null, "track": null }],
            "total": 1,
            "next": null
        }))
        .unwrap();
        let walker = PaginationWalker::new(&remote, first_page);
        assert_eq!(walker.total(), 1);
        assert_eq!(walker.collect_all().await.unwrap().len(), 1);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_surfaced() {
        let remote = FakeSpotify::new();
        let first_page: Page<PlaylistItem> = serde_json::from_value(json!({
            "items": [],
            "total": 10,
            "next": "https://api.spotify.com/v1/missing"
        }))
        .unwrap();
        let mut walker = PaginationWalker::new(&remote, first_page);
        assert!(walker.next().await.is_err());
        assert_eq!(remote.calls(), vec!["next_page https://api.spotify.com/v1/missing"]);
    }
}
