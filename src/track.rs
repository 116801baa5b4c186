//! # Track Model
//!
//! Plain data types shared by the catalog, the selector, the statistics
//! finalizer and the session. No I/O lives here.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Stable identifier of a catalog entry.
pub type TrackId = i64;

/// A track as reported by a catalog source, before persisted statistics
/// are merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedTrack {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub locator: PathBuf,
}

/// A catalog entry together with its listening statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    /// Where the audio lives; handed verbatim to the playback primitive.
    pub locator: PathBuf,
    /// Rewards minus penalties, never below zero.
    pub play_count: u32,
    /// Milliseconds since the Unix epoch, `0` if never played.
    pub last_played_at: i64,
}

impl Track {
    /// Fresh track with no listening history.
    #[must_use]
    pub fn from_scan(scanned: ScannedTrack) -> Self {
        Self::with_stats(scanned, 0, 0)
    }

    #[must_use]
    pub fn with_stats(scanned: ScannedTrack, play_count: u32, last_played_at: i64) -> Self {
        Self {
            id: scanned.id,
            title: scanned.title,
            artist: scanned.artist,
            duration_ms: scanned.duration_ms,
            locator: scanned.locator,
            play_count,
            last_played_at,
        }
    }

    /// Artist for display, with a placeholder for untagged files.
    #[must_use]
    pub fn display_artist(&self) -> &str {
        if self.artist.trim().is_empty() {
            "Unknown artist"
        } else {
            &self.artist
        }
    }

    #[must_use]
    pub fn locator(&self) -> &Path {
        &self.locator
    }
}

/// Formats a duration as `m:ss`.
///
/// ```
/// use offplay::track::format_duration;
///
/// assert_eq!(format_duration(210_000), "3:30");
/// assert_eq!(format_duration(5_999), "0:05");
/// ```
#[must_use]
pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Orders tracks by title, ignoring case, the way the catalog is
/// presented everywhere.
pub fn sort_by_title(tracks: &mut [Track]) {
    tracks.sort_by_cached_key(|track| track.title.to_lowercase());
}
