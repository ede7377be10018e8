use chrono::Utc;
use error_stack::{Report, ResultExt};
use indicatif::{ProgressBar, ProgressStyle};

use crate::backup::{BackupDocument, BackupError, BackupResult, PlaylistSnapshot, TrackEntry};
use crate::spotify::models::PlaylistItem;
use crate::spotify::pagination::PaginationWalker;
use crate::spotify::SpotifyRemote;

/// Turns the slot at `position` into a backup entry, or `None` when the slot
/// no longer resolves to a track.
pub fn track_entry(position: usize, item: PlaylistItem) -> Option<TrackEntry> {
    let added_at = item.added_at.clone();
    let track = item.into_track()?;
    let isrc = track.isrc();
    Some(TrackEntry {
        position,
        name: track.name,
        artists: track.artists.into_iter().map(|artist| artist.name).collect(),
        album: track.album.name,
        uri: track.uri,
        added_at,
        duration_ms: track.duration_ms,
        isrc,
    })
}

pub struct PlaylistExporter<'a, R> {
    remote: &'a R,
}

impl<'a, R: SpotifyRemote> PlaylistExporter<'a, R> {
    pub fn new(remote: &'a R) -> Self {
        Self { remote }
    }

    pub async fn export(&self, playlist_id: &str) -> BackupResult<BackupDocument> {
        let mut playlist = self
            .remote
            .playlist(playlist_id)
            .await
            .change_context(BackupError)
            .attach_printable(format!("Failed to fetch playlist {playlist_id}"))?;
        let user = self
            .remote
            .current_user()
            .await
            .change_context(BackupError)?;
        let first_page = playlist.take_first_page().ok_or_else(|| {
            Report::new(BackupError)
                .attach_printable(format!("Playlist {playlist_id} came back without items"))
        })?;

        let mut walker = PaginationWalker::new(self.remote, first_page);
        let progress = fetch_progress(walker.total());
        let mut tracks = vec![];
        let mut position = 0;
        while let Some(item) = walker.next().await.change_context(BackupError)? {
            if let Some(entry) = track_entry(position, item) {
                tracks.push(entry);
            }
            position += 1;
            progress.set_position(position as u64);
        }
        progress.finish();
        log::debug!(
            "playlist {playlist_id}: {} of {position} slots resolved",
            tracks.len()
        );

        let snapshot = PlaylistSnapshot {
            name: playlist.name,
            description: playlist.description.unwrap_or_default(),
            public: playlist.public,
            collaborative: playlist.collaborative,
            spotify_id: playlist.id,
            snapshot_id: playlist.snapshot_id,
            total_tracks: tracks.len(),
        };
        Ok(BackupDocument::new(Utc::now(), user.id, snapshot, tracks))
    }
}

fn fetch_progress(total: u32) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("Fetching tracks... {pos}/{len}") {
        progress.set_style(style);
    }
    progress
}
