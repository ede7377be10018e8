use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use error_stack::{IntoReport, Report, ResultExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::spotify::models::{
    ApiPlaylist, ApiUser, CreatedPlaylist, NewPlaylist, Page, SimplifiedPlaylist,
};
use crate::spotify::{SpotifyError, SpotifyRemote, SpotifyResult};

pub const CREATED_PLAYLIST_ID: &str = "created-playlist";

/// In-memory stand-in for the Web API, serving JSON fixtures and recording every call.
pub struct FakeSpotify {
    user_id: String,
    playlists_first_page: Value,
    playlists: HashMap<String, Value>,
    pages: HashMap<String, Value>,
    rejected_uris: HashSet<String>,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<NewPlaylist>>,
    added: Mutex<Vec<String>>,
}

/// A playlist slot holding track `n`.
pub fn track_item(n: usize) -> Value {
    json!({
        "added_at": format!("2024-01-{:02}T10:00:00Z", n % 28 + 1),
        "track": {
            "name": format!("Track {n}"),
            "artists": [{ "name": format!("Artist {n}") }, { "name": "Guest" }],
            "album": { "name": format!("Album {n}") },
            "uri": format!("spotify:track:{n}"),
            "duration_ms": 180_000 + n,
            "external_ids": { "isrc": format!("ISRC{n:05}") }
        }
    })
}

/// A slot whose track was removed from the catalogue.
pub fn unresolved_item() -> Value {
    json!({ "added_at": null, "track": null })
}

/// Splits `items` into pages, each paired with the URL that serves it.
fn paginate(
    items: Vec<Value>,
    page_size: usize,
    url_for_offset: impl Fn(usize) -> String,
) -> Vec<(String, Value)> {
    let total = items.len();
    let mut chunks = items
        .chunks(page_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect::<Vec<_>>();
    if chunks.is_empty() {
        chunks.push(vec![]);
    }
    let page_count = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, items)| {
            let next = if index + 1 < page_count {
                Value::String(url_for_offset((index + 1) * page_size))
            } else {
                Value::Null
            };
            let page = json!({ "items": items, "total": total, "next": next });
            (url_for_offset(index * page_size), page)
        })
        .collect()
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self {
            user_id: "tester".to_string(),
            playlists_first_page: json!({ "items": [], "total": 0, "next": null }),
            playlists: HashMap::new(),
            pages: HashMap::new(),
            rejected_uris: HashSet::new(),
            calls: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
            added: Mutex::new(vec![]),
        }
    }

    /// `count` playlists named `Playlist 1..=count`, listed `page_size` at a time.
    pub fn with_playlists(mut self, count: usize, page_size: usize) -> Self {
        let playlists = (1..=count)
            .map(|n| {
                json!({
                    "id": format!("playlist{n}"),
                    "name": format!("Playlist {n}"),
                    "owner": { "id": "tester", "display_name": "Tester" },
                    "tracks": { "total": n * 10 }
                })
            })
            .collect::<Vec<_>>();
        let mut pages = paginate(playlists, page_size, |offset| {
            format!("https://api.spotify.com/v1/me/playlists?offset={offset}&limit={page_size}")
        })
        .into_iter();
        if let Some((_, first_page)) = pages.next() {
            self.playlists_first_page = first_page;
        }
        self.pages.extend(pages);
        self
    }

    /// A playlist whose items are served `page_size` at a time.
    pub fn with_playlist(
        mut self,
        id: &str,
        name: &str,
        items: Vec<Value>,
        page_size: usize,
    ) -> Self {
        let mut pages = paginate(items, page_size, |offset| {
            format!("https://api.spotify.com/v1/playlists/{id}/tracks?offset={offset}")
        })
        .into_iter();
        let first_page = pages.next().map(|(_, page)| page).unwrap_or(Value::Null);
        self.pages.extend(pages);
        self.playlists.insert(
            id.to_string(),
            json!({
                "id": id,
                "name": name,
                "description": "Backed up ✓ ünïcode",
                "public": true,
                "collaborative": false,
                "snapshot_id": "snapshot-1",
                "tracks": first_page
            }),
        );
        self
    }

    /// Any `add_items` call containing `uri` fails.
    pub fn rejecting(mut self, uri: &str) -> Self {
        self.rejected_uris.insert(uri.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<NewPlaylist> {
        self.created.lock().unwrap().clone()
    }

    pub fn added_uris(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn decode<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> SpotifyResult<T> {
        let value = value.ok_or_else(|| {
            Report::new(SpotifyError).attach_printable(format!("404 Not Found: {what}"))
        })?;
        serde_json::from_value(value.clone())
            .into_report()
            .change_context(SpotifyError)
    }
}

#[async_trait]
impl SpotifyRemote for FakeSpotify {
    async fn current_user(&self) -> SpotifyResult<ApiUser> {
        self.record("current_user".to_string());
        Ok(ApiUser {
            id: self.user_id.clone(),
            display_name: Some("Tester".to_string()),
        })
    }

    async fn current_user_playlists(&self) -> SpotifyResult<Page<SimplifiedPlaylist>> {
        self.record("current_user_playlists".to_string());
        Self::decode(Some(&self.playlists_first_page), "me/playlists")
    }

    async fn playlist(&self, playlist_id: &str) -> SpotifyResult<ApiPlaylist> {
        self.record(format!("playlist {playlist_id}"));
        Self::decode(self.playlists.get(playlist_id), playlist_id)
    }

    async fn next_page<T>(&self, next_url: &str) -> SpotifyResult<Page<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.record(format!("next_page {next_url}"));
        Self::decode(self.pages.get(next_url), next_url)
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> SpotifyResult<CreatedPlaylist> {
        self.record(format!("create_playlist {user_id}"));
        self.created.lock().unwrap().push(playlist.clone());
        Self::decode(
            Some(&json!({
                "id": CREATED_PLAYLIST_ID,
                "external_urls": {
                    "spotify": format!("https://open.spotify.com/playlist/{CREATED_PLAYLIST_ID}")
                }
            })),
            "created playlist",
        )
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> SpotifyResult<()> {
        self.record(format!("add_items {playlist_id} {}", uris.len()));
        if let Some(rejected) = uris.iter().find(|uri| self.rejected_uris.contains(*uri)) {
            return Err(Report::new(SpotifyError)
                .attach_printable(format!("400 Bad Request: invalid uri {rejected}")));
        }
        self.added.lock().unwrap().extend(uris.iter().cloned());
        Ok(())
    }
}
