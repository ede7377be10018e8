use colored::Colorize;
use error_stack::ResultExt;
use indicatif::{ProgressBar, ProgressStyle};

use crate::backup::{BackupDocument, BackupError, BackupResult};
use crate::spotify::models::NewPlaylist;
use crate::spotify::SpotifyRemote;

/// Most URIs the Web API accepts in a single add-items call.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackOutcome {
    pub uri: String,
    pub outcome: AddOutcome,
}

#[derive(Debug, Clone)]
pub struct RestoreSummary {
    pub playlist_name: String,
    pub playlist_url: String,
    pub added: usize,
    pub total: usize,
    pub outcomes: Vec<TrackOutcome>,
}

impl RestoreSummary {
    pub fn skipped(&self) -> impl Iterator<Item = &TrackOutcome> {
        self.outcomes
            .iter()
            .filter(|track| matches!(track.outcome, AddOutcome::Skipped { .. }))
    }
}

/// Recreates a playlist from a backup. Additions go out in batches; a batch the
/// remote rejects is retried one URI at a time so a single bad URI only costs
/// itself. Nothing is rolled back.
pub struct PlaylistRestorer<'a, R> {
    remote: &'a R,
    batch_size: usize,
}

impl<'a, R: SpotifyRemote> PlaylistRestorer<'a, R> {
    pub fn new(remote: &'a R) -> Self {
        Self {
            remote,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub async fn restore(
        &self,
        document: &BackupDocument,
        name_override: Option<&str>,
    ) -> BackupResult<RestoreSummary> {
        let name = name_override.unwrap_or(&document.playlist.name).to_string();
        let user = self
            .remote
            .current_user()
            .await
            .change_context(BackupError)?;
        let request = NewPlaylist {
            name: name.clone(),
            public: document.playlist.public.unwrap_or(false),
            description: document.playlist.description.clone(),
        };
        let created = self
            .remote
            .create_playlist(&user.id, &request)
            .await
            .change_context(BackupError)
            .attach_printable(format!("Failed to create playlist '{name}'"))?;
        println!("Created playlist: {}", name.green());

        let uris = document.uris();
        let progress = add_progress(uris.len());
        let mut outcomes = Vec::with_capacity(uris.len());
        for batch in uris.chunks(self.batch_size) {
            let batch_outcomes = self.add_batch(&created.id, batch, &progress).await;
            outcomes.extend(batch_outcomes);
        }
        progress.finish();

        let added = outcomes
            .iter()
            .filter(|track| track.outcome == AddOutcome::Added)
            .count();
        Ok(RestoreSummary {
            playlist_name: name,
            playlist_url: created.public_url(),
            added,
            total: uris.len(),
            outcomes,
        })
    }

    async fn add_batch(
        &self,
        playlist_id: &str,
        batch: &[String],
        progress: &ProgressBar,
    ) -> Vec<TrackOutcome> {
        match self.remote.add_items(playlist_id, batch).await {
            Ok(()) => {
                progress.inc(batch.len() as u64);
                batch
                    .iter()
                    .map(|uri| TrackOutcome {
                        uri: uri.clone(),
                        outcome: AddOutcome::Added,
                    })
                    .collect()
            }
            Err(report) => {
                log::debug!("batch of {} rejected, adding one by one: {report:?}", batch.len());
                let mut outcomes = Vec::with_capacity(batch.len());
                for uri in batch {
                    let outcome = self.add_single(playlist_id, uri).await;
                    match &outcome {
                        AddOutcome::Added => progress.inc(1),
                        AddOutcome::Skipped { .. } => progress.suspend(|| {
                            eprintln!(
                                "{}",
                                format!("  Warning: could not add track {uri}, skipping").yellow()
                            )
                        }),
                    }
                    outcomes.push(TrackOutcome {
                        uri: uri.clone(),
                        outcome,
                    });
                }
                outcomes
            }
        }
    }

    async fn add_single(&self, playlist_id: &str, uri: &str) -> AddOutcome {
        match self.remote.add_items(playlist_id, &[uri.to_string()]).await {
            Ok(()) => AddOutcome::Added,
            Err(report) => {
                log::debug!("skipping {uri}: {report:?}");
                AddOutcome::Skipped {
                    reason: report
                        .frames()
                        .find_map(|frame| frame.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| report.to_string()),
                }
            }
        }
    }
}

fn add_progress(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("Adding tracks... {pos}/{len}") {
        progress.set_style(style);
    }
    progress
}
