//! # Player Session
//!
//! All mutable player state (catalog, current index, play state) lives in
//! one [`PlayerSession`] and changes only through [`PlayerSession::handle`].
//!
//! ## Episodes and generations
//!
//! Every time a track is started (or playback stops) the session bumps its
//! generation. A natural-completion event carries the generation it was
//! observed in; if anything happened in between, for example a manual skip,
//! the event is stale and dropped. A handled event always runs its whole
//! chain before the next one is looked at:
//!
//! ```text
//! manual switch:  finalize(user switch) -> select -> play
//! completion:     finalize(completed)   -> select -> play
//! ```

use crate::catalog::{self, CatalogSource, PrunePolicy};
use crate::db::StatsStore;
use crate::notification::NowPlaying;
use crate::playback::Playback;
use crate::selector::{NextTrackSelector, ShuffleConfig};
use crate::stats::{self, EndReason, QUICK_SKIP_MS};
use crate::track::Track;
use log::{debug, error, info, warn};

/// How the next track is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayMode {
    /// Recency window + periodic favorite picks.
    #[default]
    SmartShuffle,
    /// Catalog order, wrapping around.
    Sequential,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Everything that can happen to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The user picked a track from the list.
    PlayIndex(usize),
    TogglePlayPause,
    Next,
    Previous,
    /// The playback primitive reached the end of the track.
    Completed { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: PlayMode,
    pub quick_skip_ms: u64,
    pub shuffle: ShuffleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: PlayMode::default(),
            quick_skip_ms: QUICK_SKIP_MS,
            shuffle: ShuffleConfig::default(),
        }
    }
}

/// The player: catalog, transport state, and the collaborators it drives.
pub struct PlayerSession<P: Playback, S: StatsStore> {
    catalog: Vec<Track>,
    current: Option<usize>,
    state: PlayState,
    loaded: bool,
    generation: u64,
    completion_reported: bool,
    selector: NextTrackSelector,
    config: SessionConfig,
    status: Option<String>,
    clock: fn() -> i64,
    playback: P,
    store: S,
}

impl<P: Playback, S: StatsStore> PlayerSession<P, S> {
    #[must_use]
    pub fn new(catalog: Vec<Track>, playback: P, store: S, config: SessionConfig) -> Self {
        let selector = NextTrackSelector::new(config.shuffle);
        Self::with_selector(catalog, playback, store, config, selector)
    }

    /// Session with a caller-provided (e.g. seeded) selector.
    #[must_use]
    pub fn with_selector(
        catalog: Vec<Track>,
        playback: P,
        store: S,
        config: SessionConfig,
        selector: NextTrackSelector,
    ) -> Self {
        Self {
            catalog,
            current: None,
            state: PlayState::Stopped,
            loaded: false,
            generation: 0,
            completion_reported: false,
            selector,
            config,
            status: None,
            clock: stats::now_ms,
            playback,
            store,
        }
    }

    /// Replaces the wall clock used for statistics timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn handle(&mut self, event: PlayerEvent) {
        debug!("Handling {event:?} (generation {})", self.generation);
        match event {
            PlayerEvent::PlayIndex(index) => self.play_selected(index),
            PlayerEvent::TogglePlayPause => self.toggle_play_pause(),
            PlayerEvent::Next => self.skip_next(),
            PlayerEvent::Previous => self.skip_previous(),
            PlayerEvent::Completed { generation } => self.on_completed(generation),
        }
    }

    /// Reports a natural completion once per episode, tagged with the
    /// current generation. Meant to be polled by the event loop.
    pub fn poll_completion(&mut self) -> Option<PlayerEvent> {
        if self.completion_reported || !self.loaded || self.state != PlayState::Playing {
            return None;
        }
        if !self.playback.is_finished() {
            return None;
        }
        self.completion_reported = true;
        Some(PlayerEvent::Completed {
            generation: self.generation,
        })
    }

    /// Rescans `source` and swaps the catalog in. On failure the current
    /// catalog stays and the error becomes the status message.
    pub fn rescan(&mut self, source: &dyn CatalogSource, policy: PrunePolicy) {
        match catalog::refresh(source, &mut self.store, policy) {
            Ok(tracks) if tracks.is_empty() => {
                self.set_status("No audio files found".to_string());
            }
            Ok(tracks) => {
                let count = tracks.len();
                self.replace_catalog(tracks);
                self.set_status(format!("Catalog refreshed: {count} tracks"));
            }
            Err(e) => {
                error!("Rescan failed: {e:#}");
                self.set_status(format!("Could not load songs: {e}"));
            }
        }
    }

    /// Swaps in a new catalog, keeping the current track if it is still
    /// there and stopping playback if it is not.
    pub fn replace_catalog(&mut self, tracks: Vec<Track>) {
        let current_id = self.current_track().map(|t| t.id);
        self.catalog = tracks;

        self.current = current_id.and_then(|id| self.catalog.iter().position(|t| t.id == id));
        if current_id.is_some() && self.current.is_none() {
            info!("Current track vanished from the catalog, stopping");
            self.stop();
        }
    }

    /// Stops playback without touching statistics.
    pub fn stop(&mut self) {
        self.playback.stop();
        self.loaded = false;
        self.state = PlayState::Stopped;
        self.generation += 1;
    }

    #[must_use]
    pub fn catalog(&self) -> &[Track] {
        &self.catalog
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.catalog.get(i))
    }

    #[must_use]
    pub fn state(&self) -> PlayState {
        self.state
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn mode(&self) -> PlayMode {
        self.config.mode
    }

    #[must_use]
    pub fn now_playing(&self) -> Option<NowPlaying> {
        let index = self.current?;
        let track = self.catalog.get(index)?;
        Some(NowPlaying::new(index, track, self.state))
    }

    /// Takes the transient status message, if any.
    pub fn take_status(&mut self) -> Option<String> {
        self.status.take()
    }

    #[must_use]
    pub fn selector(&self) -> &NextTrackSelector {
        &self.selector
    }

    #[must_use]
    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn play_selected(&mut self, index: usize) {
        if index >= self.catalog.len() {
            self.set_status(format!("No track #{index}"));
            return;
        }
        self.end_episode(EndReason::UserSwitch);
        self.start_track(index);
    }

    fn toggle_play_pause(&mut self) {
        match (self.state, self.loaded) {
            (PlayState::Playing, true) => {
                self.playback.pause();
                self.state = PlayState::Paused;
            }
            (_, true) => {
                self.playback.start();
                self.state = PlayState::Playing;
            }
            (_, false) => {
                let target = match self.current {
                    Some(index) if index < self.catalog.len() => Some(index),
                    _ => self.first_index(),
                };
                if let Some(index) = target {
                    self.start_track(index);
                }
            }
        }
    }

    fn skip_next(&mut self) {
        if self.catalog.is_empty() {
            return;
        }
        self.end_episode(EndReason::UserSwitch);
        self.advance();
    }

    fn skip_previous(&mut self) {
        if self.catalog.is_empty() {
            return;
        }
        let last = self.catalog.len() - 1;
        let index = match self.current {
            Some(current) if current > 0 && current <= last => current - 1,
            _ => last,
        };
        self.end_episode(EndReason::UserSwitch);
        self.start_track(index);
    }

    fn on_completed(&mut self, generation: u64) {
        if generation != self.generation || !self.loaded {
            debug!(
                "Dropping completion from generation {generation}, now at {}",
                self.generation
            );
            return;
        }
        self.end_episode(EndReason::Completed);

        if self.catalog.is_empty() {
            self.current = None;
            self.stop();
            return;
        }
        self.advance();
    }

    /// Select -> play, after the previous episode has been finalized.
    fn advance(&mut self) {
        let next = match self.config.mode {
            PlayMode::SmartShuffle => self.selector.pick_next(&self.catalog).map(|pick| pick.index),
            PlayMode::Sequential => Some(self.current.map_or(0, |i| (i + 1) % self.catalog.len())),
        };

        match next {
            Some(index) => self.start_track(index),
            None => {
                info!("Nothing left to play");
                self.current = None;
                self.stop();
            }
        }
    }

    fn first_index(&mut self) -> Option<usize> {
        match self.config.mode {
            PlayMode::SmartShuffle => self.selector.pick_next(&self.catalog).map(|pick| pick.index),
            PlayMode::Sequential => (!self.catalog.is_empty()).then_some(0),
        }
    }

    /// Finalizes the loaded track, if there is one.
    fn end_episode(&mut self, reason: EndReason) {
        if !self.loaded {
            return;
        }
        let Some(index) = self.current else {
            return;
        };

        let elapsed_ms = self.playback.position_ms();
        let now = (self.clock)();
        if let Some(track) = self.catalog.get_mut(index) {
            stats::finalize_play(
                &mut self.store,
                track,
                elapsed_ms,
                reason,
                now,
                self.config.quick_skip_ms,
            );
        }
        self.loaded = false;
        self.state = PlayState::Stopped;
    }

    fn start_track(&mut self, index: usize) {
        self.generation += 1;
        self.completion_reported = false;

        let Some(track) = self.catalog.get(index) else {
            warn!("Asked to start missing track #{index}");
            return;
        };

        if let Err(e) = self.playback.load(track) {
            error!("Playback failed for `{}': {e:#}", track.title);
            self.set_status(format!("Playback failed: {e}"));
            self.current = Some(index);
            self.loaded = false;
            self.state = PlayState::Stopped;
            return;
        }

        self.playback.start();
        self.selector.note_played(track);
        info!("Now playing #{index} `{}' by {}", track.title, track.display_artist());

        self.current = Some(index);
        self.loaded = true;
        self.state = PlayState::Playing;
    }

    fn set_status(&mut self, message: String) {
        self.status = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::track::ScannedTrack;
    use anyhow::{bail, Result};
    use std::path::PathBuf;

    const NOW: i64 = 1_800_000_000_000;

    fn fixed_clock() -> i64 {
        NOW
    }

    /// Playback double: position and completion are set by the test.
    #[derive(Debug, Default)]
    struct FakePlayback {
        position_ms: u64,
        finished: bool,
        playing: bool,
        fail_titles: Vec<String>,
        loads: Vec<String>,
    }

    impl Playback for FakePlayback {
        fn load(&mut self, track: &Track) -> Result<()> {
            self.stop();
            if self.fail_titles.contains(&track.title) {
                bail!("decoder error");
            }
            self.loads.push(track.title.clone());
            Ok(())
        }
        fn start(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn position_ms(&self) -> u64 {
            self.position_ms
        }
        fn is_finished(&self) -> bool {
            self.finished
        }
        fn stop(&mut self) {
            self.position_ms = 0;
            self.finished = false;
            self.playing = false;
        }
    }

    fn tracks(counts: &[u32]) -> Vec<Track> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                Track::with_stats(
                    ScannedTrack {
                        id: i as i64 + 1,
                        title: format!("T{i}"),
                        artist: "A".to_string(),
                        duration_ms: 200_000,
                        locator: PathBuf::from(format!("/music/t{i}.mp3")),
                    },
                    count,
                    0,
                )
            })
            .collect()
    }

    fn session(counts: &[u32], mode: PlayMode) -> PlayerSession<FakePlayback, SqliteStore> {
        let catalog = tracks(counts);
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert_tracks(&catalog).unwrap();
        let config = SessionConfig {
            mode,
            ..SessionConfig::default()
        };
        let selector = NextTrackSelector::seeded(config.shuffle, 42);
        PlayerSession::with_selector(catalog, FakePlayback::default(), store, config, selector)
            .with_clock(fixed_clock)
    }

    #[test]
    fn test_toggle_starts_first_track_in_sequential_mode() {
        let mut s = session(&[0, 0, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::TogglePlayPause);

        assert_eq!(s.current_index(), Some(0));
        assert_eq!(s.state(), PlayState::Playing);
        assert!(s.is_loaded());

        s.handle(PlayerEvent::TogglePlayPause);
        assert_eq!(s.state(), PlayState::Paused);
        assert!(!s.playback().playing);

        s.handle(PlayerEvent::TogglePlayPause);
        assert_eq!(s.state(), PlayState::Playing);
        assert_eq!(s.playback().loads.len(), 1, "Resume must not reload");
    }

    #[test]
    fn test_sequential_next_and_previous_wrap() {
        let mut s = session(&[0, 0, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::PlayIndex(2));
        s.handle(PlayerEvent::Next);
        assert_eq!(s.current_index(), Some(0));

        s.handle(PlayerEvent::Previous);
        assert_eq!(s.current_index(), Some(2));
        s.handle(PlayerEvent::Previous);
        assert_eq!(s.current_index(), Some(1));
    }

    #[test]
    fn test_quick_skip_penalizes_and_switches() {
        let mut s = session(&[5, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::PlayIndex(0));
        s.playback_mut().position_ms = 10_000;
        s.handle(PlayerEvent::Next);

        assert_eq!(s.catalog()[0].play_count, 3);
        assert_eq!(s.catalog()[0].last_played_at, NOW);
        assert_eq!(s.store().track(1).unwrap().unwrap().play_count, 3);
        assert_eq!(s.store().history_count(1).unwrap(), 0);
        assert_eq!(s.current_index(), Some(1));
    }

    #[test]
    fn test_natural_completion_rewards_then_advances() {
        let mut s = session(&[3, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::PlayIndex(0));
        s.playback_mut().position_ms = 200_000;
        s.playback_mut().finished = true;

        let event = s.poll_completion().expect("completion should be reported");
        assert_eq!(s.poll_completion(), None, "Reported once per episode");
        s.handle(event);

        assert_eq!(s.catalog()[0].play_count, 4);
        assert_eq!(s.store().history_count(1).unwrap(), 1);
        assert_eq!(s.current_index(), Some(1));
        assert_eq!(s.state(), PlayState::Playing);
    }

    #[test]
    fn test_stale_completion_is_superseded_by_manual_skip() {
        let mut s = session(&[0, 0, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::PlayIndex(0));
        s.playback_mut().position_ms = 200_000;
        s.playback_mut().finished = true;
        let stale = s.poll_completion().unwrap();

        // The user skips before the completion is handled.
        s.handle(PlayerEvent::Next);
        assert_eq!(s.current_index(), Some(1));
        let generation = s.generation();

        s.handle(stale);
        assert_eq!(s.current_index(), Some(1), "Stale completion must not advance");
        assert_eq!(s.generation(), generation);
        assert_eq!(s.catalog()[1].play_count, 0);
        // Track 0 was finalized once, as a user switch after 200s.
        assert_eq!(s.catalog()[0].play_count, 1);
    }

    #[test]
    fn test_playback_failure_leaves_session_stopped() {
        let mut s = session(&[0, 0], PlayMode::Sequential);
        s.playback_mut().fail_titles.push("T1".to_string());

        s.handle(PlayerEvent::PlayIndex(0));
        s.handle(PlayerEvent::Next);

        assert_eq!(s.state(), PlayState::Stopped);
        assert!(!s.is_loaded());
        assert!(s.take_status().unwrap().contains("Playback failed"));
        assert_eq!(s.poll_completion(), None);

        // The display points at the track that failed, not the one before.
        assert_eq!(s.current_index(), Some(1));
        let now = s.now_playing().unwrap();
        assert_eq!(now.title, "T1");
        assert_eq!(now.state, PlayState::Stopped);

        // Moving on from the failed track continues past it.
        s.handle(PlayerEvent::Next);
        assert_eq!(s.current_index(), Some(0));
        assert_eq!(s.state(), PlayState::Playing);
    }

    #[test]
    fn test_smart_shuffle_avoids_recent_tracks() {
        let mut s = session(&[0; 10], PlayMode::SmartShuffle);
        s.handle(PlayerEvent::TogglePlayPause);

        let mut seen = vec![s.current_index().unwrap()];
        for _ in 0..9 {
            s.playback_mut().position_ms = 60_000;
            s.handle(PlayerEvent::Next);
            seen.push(s.current_index().unwrap());
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 10, "Ten picks over ten tracks must not repeat");
        assert_eq!(s.mode(), PlayMode::SmartShuffle);
        assert_eq!(s.selector().window().len(), 10);
    }

    #[test]
    fn test_single_track_replays_on_completion() {
        let mut s = session(&[0], PlayMode::SmartShuffle);
        s.handle(PlayerEvent::TogglePlayPause);
        for expected_count in 1..=2 {
            s.playback_mut().position_ms = 200_000;
            s.playback_mut().finished = true;
            let event = s.poll_completion().unwrap();
            s.handle(event);
            assert_eq!(s.current_index(), Some(0));
            assert_eq!(s.catalog()[0].play_count, expected_count);
        }
    }

    #[test]
    fn test_empty_catalog_is_inert() {
        let mut s = session(&[], PlayMode::SmartShuffle);
        s.handle(PlayerEvent::TogglePlayPause);
        s.handle(PlayerEvent::Next);
        s.handle(PlayerEvent::Previous);
        s.handle(PlayerEvent::PlayIndex(0));

        assert_eq!(s.current_index(), None);
        assert_eq!(s.state(), PlayState::Stopped);
        assert_eq!(s.take_status().as_deref(), Some("No track #0"));
    }

    #[test]
    fn test_replace_catalog_remaps_current() {
        let mut s = session(&[0, 0, 0], PlayMode::Sequential);
        s.handle(PlayerEvent::PlayIndex(1));
        let playing_id = s.current_track().unwrap().id;

        let mut reordered = s.catalog().to_vec();
        reordered.reverse();
        s.replace_catalog(reordered);
        assert_eq!(s.current_track().unwrap().id, playing_id);
        assert_eq!(s.current_index(), Some(1));

        let without_current: Vec<Track> = s
            .catalog()
            .iter()
            .filter(|t| t.id != playing_id)
            .cloned()
            .collect();
        s.replace_catalog(without_current);
        assert_eq!(s.current_index(), None);
        assert_eq!(s.state(), PlayState::Stopped);
    }
}
