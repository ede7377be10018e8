use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One page of a paginated Web API collection.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total: u32,
    pub next: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TracksRef {
    pub total: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    pub owner: Option<ApiUser>,
    tracks: Option<TracksRef>,
    items: Option<TracksRef>,
}

impl SimplifiedPlaylist {
    pub fn track_total(&self) -> Option<u32> {
        self.tracks
            .as_ref()
            .or(self.items.as_ref())
            .map(|tracks| tracks.total)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref()?.display_name.as_deref()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    pub snapshot_id: String,
    tracks: Option<Page<PlaylistItem>>,
    items: Option<Page<PlaylistItem>>,
}

impl ApiPlaylist {
    /// The embedded first page of items, under either of the keys the API has used.
    pub fn take_first_page(&mut self) -> Option<Page<PlaylistItem>> {
        self.tracks.take().or_else(|| self.items.take())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PlaylistItem {
    pub added_at: Option<String>,
    track: Option<ApiTrack>,
    item: Option<ApiTrack>,
}

impl PlaylistItem {
    /// `None` when the slot no longer resolves to a playable item.
    pub fn into_track(self) -> Option<ApiTrack> {
        self.track.or(self.item)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiArtist {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ApiAlbum {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiTrack {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
    // episodes carry a show instead of an album
    #[serde(default)]
    pub album: ApiAlbum,
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    pub external_ids: Option<HashMap<String, String>>,
}

impl ApiTrack {
    pub fn isrc(&self) -> Option<String> {
        self.external_ids.as_ref()?.get("isrc").cloned()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewPlaylist {
    pub name: String,
    pub public: bool,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreatedPlaylist {
    pub id: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl CreatedPlaylist {
    pub fn public_url(&self) -> String {
        self.external_urls
            .spotify
            .clone()
            .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", self.id))
    }
}
