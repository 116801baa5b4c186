//! # Play Statistics
//!
//! Turns the end of a play episode into a play-count adjustment:
//!
//! - **Quick skip**: the user switched away before the threshold
//!   (30 s by default). Counts as a dislike, `-2`.
//! - **Reward**: natural completion, or a manual switch after the threshold,
//!   `+1`, and the play is appended to the history log.
//!
//! The play count never drops below zero.

use crate::db::StatsStore;
use crate::track::Track;
use log::{debug, warn};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default quick-skip threshold in milliseconds.
pub const QUICK_SKIP_MS: u64 = 30_000;

const SKIP_PENALTY: i64 = -2;
const COMPLETION_REWARD: i64 = 1;

/// Why a play episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user skipped, went back, or picked another track.
    UserSwitch,
    /// The playback primitive reported the end of the track.
    Completed,
}

/// Result of finalizing one play episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalized {
    pub delta: i64,
    pub play_count: u32,
    pub last_played_at: i64,
    /// A history entry was written.
    pub logged: bool,
}

/// Play-count delta for an episode that ran `elapsed_ms`.
#[must_use]
pub const fn play_count_delta(elapsed_ms: u64, reason: EndReason, quick_skip_ms: u64) -> i64 {
    match reason {
        EndReason::UserSwitch if elapsed_ms < quick_skip_ms => SKIP_PENALTY,
        _ => COMPLETION_REWARD,
    }
}

/// Applies a delta with the zero floor.
#[must_use]
pub fn adjusted_play_count(play_count: u32, delta: i64) -> u32 {
    let adjusted = (i64::from(play_count) + delta).max(0);
    u32::try_from(adjusted).unwrap_or(u32::MAX)
}

/// Finalizes a play episode: updates `track` in place, persists the new
/// statistics and, for rewarded plays, appends a history entry.
///
/// Store failures are logged and swallowed; the in-memory track is updated
/// regardless so the session keeps going.
pub fn finalize_play(
    store: &mut dyn StatsStore,
    track: &mut Track,
    elapsed_ms: u64,
    reason: EndReason,
    now_ms: i64,
    quick_skip_ms: u64,
) -> Finalized {
    let delta = play_count_delta(elapsed_ms, reason, quick_skip_ms);
    track.play_count = adjusted_play_count(track.play_count, delta);
    track.last_played_at = now_ms;

    debug!(
        "Finalized `{}' after {elapsed_ms}ms ({reason:?}): delta {delta}, play count {}",
        track.title, track.play_count
    );

    if let Err(e) = store.update_play_stats(track.id, track.play_count, now_ms) {
        warn!("Failed to persist play stats for `{}': {e:#}", track.title);
    }

    let mut logged = false;
    if delta > 0 {
        match store.append_history(track.id, now_ms) {
            Ok(()) => logged = true,
            Err(e) => warn!("Failed to append history for `{}': {e:#}", track.title),
        }
    }

    Finalized {
        delta,
        play_count: track.play_count,
        last_played_at: now_ms,
        logged,
    }
}

/// Wall clock in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
