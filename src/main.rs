use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use error_stack::fmt::{Charset, ColorMode};
use error_stack::{FutureExt, Report, ResultExt};

use crate::auth::spotify_auth::SpotifyAuth;
use crate::auth::TokenCache;
use crate::backup::commands::BackupCommands;
use crate::config::AppConfig;
use crate::spotify::api::SpotifyApi;

mod auth;
mod backup;
mod config;
mod selection;
mod spotify;

#[derive(Debug)]
pub struct SpotifyBackupError;
impl fmt::Display for SpotifyBackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Spotify backup error")
    }
}
impl std::error::Error for SpotifyBackupError {}

pub type SpotifyBackupResult<T> = error_stack::Result<T, SpotifyBackupError>;

const HELP_EPILOG: &str = "\
Examples:
  spotify-backup list
  spotify-backup export
  spotify-backup export --playlist-id 3
  spotify-backup export --playlist-id 37i9dQZF1DXcBWIGoYBM5M -o chill.json
  spotify-backup import -i chill.json --name \"Chill (restored)\"
  spotify-backup --account work export

Environment variables (or a .env file in the working directory):
  SPOTIFY_CLIENT_ID       Spotify app client id (required)
  SPOTIFY_REDIRECT_URI    redirect URI registered for the app (required)
  SPOTIFY_CLIENT_SECRET   client secret (optional)
  RUST_LOG                log level, defaults to warn
The SPOTIPY_CLIENT_ID, SPOTIPY_REDIRECT_URI and SPOTIPY_CLIENT_SECRET
spellings are accepted as well.";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "spotify-backup",
    author,
    version,
    about = "Back up Spotify playlists to JSON files and restore them",
    after_help = HELP_EPILOG
)]
struct Cli {
    /// Account name, keeps a separate token cache per account
    #[clap(long, global = true)]
    account: Option<String>,
    #[command(subcommand)]
    command: SpotifyBackupCommands,
}

#[derive(Subcommand, Debug, PartialEq, Clone)]
enum SpotifyBackupCommands {
    /// List your playlists
    List,
    /// Export a playlist to a JSON file
    Export {
        /// Playlist id, or its number in the `list` output
        #[clap(long)]
        playlist_id: Option<String>,
        /// Output file, defaults to `<playlist name>.json`
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Recreate a playlist from a JSON backup
    Import {
        /// Backup file to read
        #[clap(long, short)]
        input: PathBuf,
        /// Name for the new playlist, defaults to the backed up name
        #[clap(long)]
        name: Option<String>,
    },
}

impl SpotifyBackupCommands {
    pub async fn execute(&self, api: &SpotifyApi) -> SpotifyBackupResult<()> {
        match self {
            SpotifyBackupCommands::List => {
                BackupCommands::list(api)
                    .change_context(SpotifyBackupError)
                    .await
            }
            SpotifyBackupCommands::Export {
                playlist_id,
                output,
            } => {
                BackupCommands::export(api, playlist_id.as_deref(), output.as_deref())
                    .change_context(SpotifyBackupError)
                    .await
            }
            SpotifyBackupCommands::Import { input, name } => {
                BackupCommands::import(api, input, name.as_deref())
                    .change_context(SpotifyBackupError)
                    .await
            }
        }
    }
}

pub struct Suggestion(String);

impl Suggestion {
    pub fn set_report() {
        Report::set_charset(Charset::Utf8);
        Report::set_color_mode(ColorMode::Color);
        Report::install_debug_hook::<Self>(|Self(value), context| {
            context.push_body(format!("{}: {value}", "suggestion".yellow()))
        });
    }
}

async fn run() -> SpotifyBackupResult<()> {
    let cli = Cli::parse();

    Suggestion::set_report();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = AppConfig::from_env().change_context(SpotifyBackupError)?;
    let cache = TokenCache::for_account(cli.account.as_deref());
    let access_token = SpotifyAuth::new(&config, cache)
        .change_context(SpotifyBackupError)?
        .access_token()
        .await
        .change_context(SpotifyBackupError)?;
    let api = SpotifyApi::new(access_token).change_context(SpotifyBackupError)?;

    cli.command.execute(&api).await
}

#[tokio::main]
async fn main() -> SpotifyBackupResult<()> {
    run().await
}
