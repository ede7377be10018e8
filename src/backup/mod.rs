use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use error_stack::{IntoReport, ResultExt};
use serde::{Deserialize, Deserializer, Serialize};

pub mod commands;
pub mod export;
pub mod restore;

#[derive(Debug)]
pub struct BackupError;

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Backup error")
    }
}

impl std::error::Error for BackupError {}

pub type BackupResult<T> = error_stack::Result<T, BackupError>;

const EXPORTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Point-in-time copy of a playlist as written to disk. Created once by an
/// export and never modified afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BackupDocument {
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub source_account: String,
    pub playlist: PlaylistSnapshot,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaylistSnapshot {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    #[serde(default)]
    pub spotify_id: String,
    #[serde(default)]
    pub snapshot_id: String,
    /// Number of entries in `tracks`, not the number of slots in the remote playlist.
    #[serde(default)]
    pub total_tracks: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackEntry {
    /// Slot index in the remote playlist, counting unresolved slots too.
    #[serde(default)]
    pub position: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub album: String,
    pub uri: String,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub isrc: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl BackupDocument {
    pub fn new(
        exported_at: DateTime<Utc>,
        source_account: String,
        mut playlist: PlaylistSnapshot,
        tracks: Vec<TrackEntry>,
    ) -> Self {
        playlist.total_tracks = tracks.len();
        Self {
            exported_at: exported_at.format(EXPORTED_AT_FORMAT).to_string(),
            source_account,
            playlist,
            tracks,
        }
    }

    pub fn uris(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.uri.clone()).collect()
    }

    pub fn read_from(path: &Path) -> BackupResult<Self> {
        let content = fs::read_to_string(path)
            .into_report()
            .change_context(BackupError)
            .attach_printable(format!("Failed to read backup file at {}", path.display()))?;
        serde_json::from_str(&content)
            .into_report()
            .change_context(BackupError)
            .attach_printable(format!(
                "{} is not a valid playlist backup",
                path.display()
            ))
    }

    /// Writes indented UTF-8 JSON, replacing whatever is at `path`.
    pub fn write_to(&self, path: &Path) -> BackupResult<()> {
        let serialized = serde_json::to_string_pretty(self)
            .into_report()
            .change_context(BackupError)?;
        fs::write(path, serialized)
            .into_report()
            .change_context(BackupError)
            .attach_printable(format!("Failed to write backup file at {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_document() -> BackupDocument {
        let exported_at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap();
        BackupDocument::new(
            exported_at,
            "tester".to_string(),
            PlaylistSnapshot {
                name: "Café del Mar".to_string(),
                description: "Chill ☕".to_string(),
                public: Some(false),
                collaborative: false,
                spotify_id: "abc".to_string(),
                snapshot_id: "snap".to_string(),
                total_tracks: 0,
            },
            vec![TrackEntry {
                position: 2,
                name: "Sueño".to_string(),
                artists: vec!["Artist".to_string()],
                album: "Album".to_string(),
                uri: "spotify:track:1".to_string(),
                added_at: None,
                duration_ms: 1000,
                isrc: None,
            }],
        )
    }

    #[test]
    fn test_new_document_counts_entries_and_formats_timestamp() {
        let document = sample_document();
        assert_eq!(document.exported_at, "2024-03-09T08:05:01Z");
        assert_eq!(document.playlist.total_tracks, 1);
    }

    #[test]
    fn test_written_file_is_indented_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        fs::write(&path, "stale content that must be replaced").unwrap();

        let document = sample_document();
        document.write_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"exported_at\": \"2024-03-09T08:05:01Z\""));
        assert!(written.contains("\"name\": \"Café del Mar\""));
        assert!(written.contains("\"isrc\": null"));
        assert!(!written.contains("stale"));
        assert_eq!(BackupDocument::read_from(&path).unwrap(), document);
    }

    #[test]
    fn test_reads_minimal_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.json");
        fs::write(
            &path,
            r#"{"exported_at": "2024-01-01T00:00:00Z", "source_account": "x",
                "playlist": {"name": "Mix"},
                "tracks": [{"position": 0, "uri": "spotify:track:9"}]}"#,
        )
        .unwrap();

        let document = BackupDocument::read_from(&path).unwrap();
        assert_eq!(document.playlist.description, "");
        assert_eq!(document.playlist.public, None);
        assert_eq!(document.uris(), vec!["spotify:track:9".to_string()]);
    }

    #[test]
    fn test_reads_backup_with_only_the_fields_import_uses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.json");
        fs::write(
            &path,
            r#"{"playlist": {"name": "Mix", "description": null, "public": true},
                "tracks": [{"uri": "spotify:track:1"}, {"uri": "spotify:track:2", "album": null}]}"#,
        )
        .unwrap();

        let document = BackupDocument::read_from(&path).unwrap();
        assert_eq!(document.exported_at, "");
        assert_eq!(document.source_account, "");
        assert_eq!(document.playlist.description, "");
        assert_eq!(document.playlist.public, Some(true));
        assert_eq!(
            document.uris(),
            vec!["spotify:track:1".to_string(), "spotify:track:2".to_string()]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BackupDocument::read_from(&dir.path().join("absent.json")).is_err());
    }
}
