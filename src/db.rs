//! # Database Module
//!
//! SQLite persistence for the catalog and its listening statistics.
//!
//! ## Schema
//!
//! ```sql
//! songs (
//!     id             INTEGER PRIMARY KEY,   -- stable track identifier
//!     title          TEXT    NOT NULL,
//!     artist         TEXT    NOT NULL,
//!     duration_ms    INTEGER NOT NULL,
//!     locator        TEXT    NOT NULL,
//!     play_count     INTEGER NOT NULL DEFAULT 0,
//!     last_played_at INTEGER NOT NULL DEFAULT 0
//! )
//!
//! playback_history (
//!     entry_id  INTEGER PRIMARY KEY AUTOINCREMENT,
//!     song_id   INTEGER NOT NULL,
//!     timestamp INTEGER NOT NULL
//! )
//! ```
//!
//! `playback_history` is append-only: nothing in this crate updates or
//! deletes its rows.

use crate::track::{sort_by_title, Track, TrackId};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Key-value statistics store plus append-only history log.
///
/// The session and the finalizer only talk to this trait, so tests can run
/// against an in-memory database.
pub trait StatsStore {
    /// Every persisted track, sorted by title ignoring case.
    fn load_tracks(&self) -> Result<Vec<Track>>;

    /// Inserts new tracks and overwrites existing ones by identifier.
    fn upsert_tracks(&mut self, tracks: &[Track]) -> Result<()>;

    fn update_play_stats(&mut self, id: TrackId, play_count: u32, last_played_at: i64)
        -> Result<()>;

    fn append_history(&mut self, id: TrackId, timestamp: i64) -> Result<()>;

    /// Deletes songs whose identifier is not in `keep`. Returns how many went.
    fn prune_missing(&mut self, keep: &[TrackId]) -> Result<usize>;
}

/// One row of `playback_history`, joined with the song title when the song
/// is still known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub entry_id: i64,
    pub track_id: TrackId,
    pub timestamp: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// SQLite-backed [`StatsStore`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and makes sure the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open music database at {}", path.display()))?;
        debug!("Opened music database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Throwaway database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS songs (
                    id             INTEGER PRIMARY KEY,
                    title          TEXT    NOT NULL,
                    artist         TEXT    NOT NULL,
                    duration_ms    INTEGER NOT NULL,
                    locator        TEXT    NOT NULL,
                    play_count     INTEGER NOT NULL DEFAULT 0,
                    last_played_at INTEGER NOT NULL DEFAULT 0
                );
                CREATE TABLE IF NOT EXISTS playback_history (
                    entry_id  INTEGER PRIMARY KEY AUTOINCREMENT,
                    song_id   INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_history_song ON playback_history(song_id);",
            )
            .context("Failed to create database schema")?;
        Ok(())
    }

    /// Most recent history entries first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT h.entry_id, h.song_id, h.timestamp, s.title, s.artist
                 FROM playback_history h
                 LEFT JOIN songs s ON s.id = h.song_id
                 ORDER BY h.timestamp DESC, h.entry_id DESC
                 LIMIT ?1",
            )
            .context("Failed to prepare history query")?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map([limit], |row| {
                Ok(HistoryEntry {
                    entry_id: row.get(0)?,
                    track_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    title: row.get(3)?,
                    artist: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load playback history")?;
        Ok(entries)
    }

    /// Number of history entries recorded for one track.
    pub fn history_count(&self, id: TrackId) -> Result<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM playback_history WHERE song_id = ?1",
                [id],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to count history for song {id}"))
    }

    /// Single track by identifier, if persisted.
    pub fn track(&self, id: TrackId) -> Result<Option<Track>> {
        use rusqlite::OptionalExtension;

        self.conn
            .query_row(
                "SELECT id, title, artist, duration_ms, locator, play_count, last_played_at
                 FROM songs WHERE id = ?1",
                [id],
                track_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load song {id}"))
    }
}

impl StatsStore for SqliteStore {
    fn load_tracks(&self) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, artist, duration_ms, locator, play_count, last_played_at
                 FROM songs ORDER BY title COLLATE NOCASE ASC",
            )
            .context("Failed to prepare song selection query")?;

        let mut tracks = stmt
            .query_map([], track_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load songs from database")?;

        // NOCASE only folds ASCII; keep the order identical to fresh scans.
        sort_by_title(&mut tracks);
        trace!("Loaded {} songs from database", tracks.len());
        Ok(tracks)
    }

    fn upsert_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO songs
                    (id, title, artist, duration_ms, locator, play_count, last_played_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for track in tracks {
                stmt.execute(params![
                    track.id,
                    track.title,
                    track.artist,
                    i64::try_from(track.duration_ms).unwrap_or(i64::MAX),
                    track.locator.to_string_lossy().into_owned(),
                    track.play_count,
                    track.last_played_at,
                ])
                .with_context(|| format!("Failed to upsert song `{}'", track.title))?;
            }
        }
        tx.commit().context("Committing song upsert failed")?;

        info!("Upserted {} songs", tracks.len());
        Ok(())
    }

    fn update_play_stats(
        &mut self,
        id: TrackId,
        play_count: u32,
        last_played_at: i64,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE songs SET play_count = ?1, last_played_at = ?2 WHERE id = ?3",
                params![play_count, last_played_at, id],
            )
            .with_context(|| format!("Failed to update play stats for song {id}"))?;

        if changed == 0 {
            debug!("Play stats update for unknown song {id} changed nothing");
        }
        Ok(())
    }

    fn append_history(&mut self, id: TrackId, timestamp: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO playback_history (song_id, timestamp) VALUES (?1, ?2)",
                params![id, timestamp],
            )
            .with_context(|| format!("Failed to append history for song {id}"))?;
        Ok(())
    }

    fn prune_missing(&mut self, keep: &[TrackId]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS keep_ids (id INTEGER PRIMARY KEY); DELETE FROM keep_ids;",
        )?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO keep_ids (id) VALUES (?1)")?;
            for id in keep {
                stmt.execute([id])?;
            }
        }
        let removed = tx
            .execute("DELETE FROM songs WHERE id NOT IN (SELECT id FROM keep_ids)", [])
            .context("Failed to prune missing songs")?;
        tx.execute_batch("DROP TABLE keep_ids;")?;
        tx.commit().context("Committing prune failed")?;

        info!("Pruned {removed} songs that are no longer on disk");
        Ok(removed)
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let duration_ms: i64 = row.get(3)?;
    let locator: String = row.get(4)?;
    let play_count: i64 = row.get(5)?;
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        duration_ms: u64::try_from(duration_ms).unwrap_or(0),
        locator: PathBuf::from(locator),
        play_count: u32::try_from(play_count).unwrap_or(0),
        last_played_at: row.get(6)?,
    })
}
