//! Catalog reconciliation.
//!
//! A fresh scan only knows metadata; the store knows listening statistics.
//! Reconciling carries the statistics forward by identifier and writes the
//! merged catalog back.

use crate::db::StatsStore;
use crate::track::{ScannedTrack, Track, TrackId};
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;

/// Anything that can list the audio tracks currently available.
pub trait CatalogSource {
    /// All available tracks, sorted by title ignoring case.
    fn scan(&self) -> Result<Vec<ScannedTrack>>;
}

/// What to do with persisted songs that a scan no longer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrunePolicy {
    /// Leave them stale in storage.
    #[default]
    Keep,
    /// Delete them (their history rows stay).
    Prune,
}

/// Merges scanned metadata with persisted statistics, keeping scan order.
#[must_use]
pub fn reconcile(scanned: Vec<ScannedTrack>, persisted: &[Track]) -> Vec<Track> {
    let previous: HashMap<TrackId, &Track> = persisted.iter().map(|t| (t.id, t)).collect();

    scanned
        .into_iter()
        .map(|fresh| match previous.get(&fresh.id) {
            Some(old) => Track::with_stats(fresh, old.play_count, old.last_played_at),
            None => Track::from_scan(fresh),
        })
        .collect()
}

/// Scans `source`, reconciles against `store` and upserts the result.
///
/// An empty scan writes nothing, so a temporarily unavailable library does
/// not wipe anything.
///
/// # Errors
///
/// Fails if the scan fails or the store cannot be read or written. The
/// store is left untouched when the scan fails.
pub fn refresh(
    source: &dyn CatalogSource,
    store: &mut dyn StatsStore,
    policy: PrunePolicy,
) -> Result<Vec<Track>> {
    let scanned = source.scan().context("Failed to scan music library")?;
    let persisted = store
        .load_tracks()
        .context("Failed to load persisted statistics")?;

    let merged = reconcile(scanned, &persisted);
    let carried = merged.iter().filter(|t| t.play_count > 0 || t.last_played_at > 0).count();
    debug!(
        "Reconciled {} scanned tracks against {} persisted ({carried} with history)",
        merged.len(),
        persisted.len()
    );

    if merged.is_empty() {
        info!("Scan found no tracks, leaving the database as it is");
        return Ok(merged);
    }

    store.upsert_tracks(&merged)?;

    if policy == PrunePolicy::Prune {
        let keep: Vec<TrackId> = merged.iter().map(|t| t.id).collect();
        store.prune_missing(&keep)?;
    }

    Ok(merged)
}

/// The persisted catalog, for starting without a rescan.
pub fn load_cached(store: &dyn StatsStore) -> Result<Vec<Track>> {
    store.load_tracks().context("Failed to load cached catalog")
}
