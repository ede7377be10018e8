use std::io;
use std::path::{Path, PathBuf};

use colored::Colorize;
use error_stack::{Report, ResultExt};

use super::export::PlaylistExporter;
use super::restore::{AddOutcome, PlaylistRestorer};
use super::{BackupDocument, BackupError, BackupResult};
use crate::selection::{prompt_for_selection, PlaylistRef, SelectionResult, Selector};
use crate::spotify::models::SimplifiedPlaylist;
use crate::spotify::pagination::list_playlists;
use crate::spotify::SpotifyRemote;

/// Which playlist to export and where to write it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTarget {
    pub playlist_id: String,
    pub output_path: PathBuf,
}

pub struct BackupCommands;

impl BackupCommands {
    pub async fn list<R: SpotifyRemote>(remote: &R) -> BackupResult<()> {
        let playlists = list_playlists(remote)
            .await
            .change_context(BackupError)?;
        println!("\nFound {} playlists:\n", playlists.len());
        for (number, playlist) in playlists.iter().enumerate() {
            println!(
                "{}",
                playlist_line(number + 1, playlist, playlist.owner_name().or(Some("?")))
            );
        }
        Ok(())
    }

    pub async fn export<R: SpotifyRemote>(
        remote: &R,
        playlist_arg: Option<&str>,
        output: Option<&Path>,
    ) -> BackupResult<()> {
        let target =
            resolve_export_target(remote, playlist_arg, output, choose_interactively).await?;
        let document = PlaylistExporter::new(remote)
            .export(&target.playlist_id)
            .await?;
        document.write_to(&target.output_path)?;
        println!(
            "Exported {} tracks to {}",
            document.tracks.len().to_string().cyan(),
            target.output_path.display().to_string().green()
        );
        Ok(())
    }

    pub async fn import<R: SpotifyRemote>(
        remote: &R,
        input: &Path,
        name_override: Option<&str>,
    ) -> BackupResult<()> {
        let document = BackupDocument::read_from(input)?;
        let summary = PlaylistRestorer::new(remote)
            .restore(&document, name_override)
            .await?;
        println!(
            "Imported {}/{} tracks into '{}'",
            summary.added.to_string().cyan(),
            summary.total,
            summary.playlist_name.green()
        );
        let skipped = summary.skipped().collect::<Vec<_>>();
        if !skipped.is_empty() {
            println!(
                "{}",
                format!("Skipped {} tracks that could not be added", skipped.len()).yellow()
            );
            for track in skipped {
                if let AddOutcome::Skipped { reason } = &track.outcome {
                    log::info!("skipped {}: {reason}", track.uri);
                }
            }
        }
        println!("Playlist URL: {}", summary.playlist_url.blue());
        Ok(())
    }
}

/// Resolves `--playlist-id` (a remote id or a 1-based list number) or, when it
/// is absent, asks `choose` to pick from the listing.
pub async fn resolve_export_target<R, F>(
    remote: &R,
    playlist_arg: Option<&str>,
    output: Option<&Path>,
    choose: F,
) -> BackupResult<ExportTarget>
where
    R: SpotifyRemote,
    F: FnOnce(&[SimplifiedPlaylist]) -> SelectionResult<usize>,
{
    let selected = match playlist_arg.map(PlaylistRef::parse) {
        Some(PlaylistRef::Id(playlist_id)) => {
            let output_path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_output_path(&playlist_id));
            return Ok(ExportTarget {
                playlist_id,
                output_path,
            });
        }
        Some(PlaylistRef::Index(number)) => {
            let playlists = list_playlists(remote)
                .await
                .change_context(BackupError)?;
            let index = PlaylistRef::resolve_index(number, playlists.len())
                .change_context(BackupError)?;
            playlists[index].clone()
        }
        None => {
            let playlists = list_playlists(remote)
                .await
                .change_context(BackupError)?;
            if playlists.is_empty() {
                return Err(Report::new(BackupError).attach_printable("No playlists found"));
            }
            let index = choose(&playlists).change_context(BackupError)?;
            playlists[index].clone()
        }
    };

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&selected.name));
    Ok(ExportTarget {
        playlist_id: selected.id,
        output_path,
    })
}

/// `<name>.json` in the working directory.
pub fn default_output_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}.json", name.replace(['/', '\\'], ",")))
}

fn playlist_line(number: usize, playlist: &SimplifiedPlaylist, owner: Option<&str>) -> String {
    let total = playlist
        .track_total()
        .map(|total| total.to_string())
        .unwrap_or_else(|| "?".to_string());
    match owner {
        Some(owner) => format!(
            "  {number:3}. {}  ({total} tracks, by {owner})",
            playlist.name
        ),
        None => format!("  {number:3}. {}  ({total} tracks)", playlist.name),
    }
}

fn choose_interactively(playlists: &[SimplifiedPlaylist]) -> SelectionResult<usize> {
    println!("\nYour playlists:\n");
    for (number, playlist) in playlists.iter().enumerate() {
        println!("{}", playlist_line(number + 1, playlist, None));
    }
    println!();
    prompt_for_selection(
        Selector::new(playlists.len()),
        io::stdin().lock(),
        io::stdout(),
    )
}
