//! Smart shuffle: next-track selection.
//!
//! Mixes uniform random picks with a periodic "favorite" pick (highest
//! play count), while a [`RecencyWindow`] keeps recently played tracks out
//! of the candidate set.
//!
//! ```text
//! rotation: 0 -> random -> 1 -> random -> 2 -> favorite -> 0 -> ...
//! ```
//!
//! When every catalog track is in the window, the window is cleared and the
//! whole catalog becomes eligible again, so even a one-track catalog always
//! yields a pick.

use crate::recency::RecencyWindow;
use crate::track::Track;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Tunables for the smart shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleConfig {
    /// How many identifiers the recency window remembers.
    pub recency_capacity: usize,
    /// Random picks made before every favorite pick.
    pub random_picks_per_favorite: u32,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            recency_capacity: crate::recency::DEFAULT_CAPACITY,
            random_picks_per_favorite: 2,
        }
    }
}

/// How a pick was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    Random,
    Favorite,
}

/// Outcome of [`NextTrackSelector::pick_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    /// Index into the catalog slice that was passed in.
    pub index: usize,
    pub mode: PickMode,
    /// The recency window was exhausted and cleared for this pick.
    pub exhausted: bool,
}

/// Session-scoped next-track picker.
#[derive(Debug, Clone)]
pub struct NextTrackSelector<R = StdRng> {
    window: RecencyWindow,
    rotation: u32,
    config: ShuffleConfig,
    rng: R,
}

impl NextTrackSelector<StdRng> {
    #[must_use]
    pub fn new(config: ShuffleConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic selector, for tests and benchmarks.
    #[must_use]
    pub fn seeded(config: ShuffleConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NextTrackSelector<R> {
    pub fn with_rng(config: ShuffleConfig, rng: R) -> Self {
        Self {
            window: RecencyWindow::new(config.recency_capacity),
            rotation: 0,
            config,
            rng,
        }
    }

    /// Chooses the next track and remembers it as recently played.
    ///
    /// Returns `None` only for an empty catalog.
    pub fn pick_next(&mut self, catalog: &[Track]) -> Option<Pick> {
        if catalog.is_empty() {
            debug!("No selection: catalog is empty");
            return None;
        }

        let mut candidates: Vec<usize> = catalog
            .iter()
            .enumerate()
            .filter(|(_, track)| !self.window.contains(track.id))
            .map(|(index, _)| index)
            .collect();

        let exhausted = candidates.is_empty();
        if exhausted {
            debug!(
                "All {} tracks are recent, clearing recency window",
                catalog.len()
            );
            self.window.clear();
            candidates = (0..catalog.len()).collect();
        }

        let (index, mode) = if self.rotation < self.config.random_picks_per_favorite {
            self.rotation += 1;
            (self.random_candidate(&candidates), PickMode::Random)
        } else {
            self.rotation = 0;
            let favorite = favorite_candidate(catalog, &candidates)
                .unwrap_or_else(|| self.random_candidate(&candidates));
            (favorite, PickMode::Favorite)
        };

        let track = &catalog[index];
        self.window.record(track.id);
        debug!(
            "Picked `{}' ({:?}, play count {}, rotation now {})",
            track.title, mode, track.play_count, self.rotation
        );
        trace!("Recency window: {:?}", self.window.iter().collect::<Vec<_>>());

        Some(Pick {
            index,
            mode,
            exhausted,
        })
    }

    /// Marks a track as played without going through a pick, e.g. when the
    /// user chose it from the list.
    pub fn note_played(&mut self, track: &Track) {
        self.window.record(track.id);
    }

    #[must_use]
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    #[must_use]
    pub fn window(&self) -> &RecencyWindow {
        &self.window
    }

    // `candidates` is never empty here; the empty catalog returns early.
    fn random_candidate(&mut self, candidates: &[usize]) -> usize {
        candidates[self.rng.gen_range(0..candidates.len())]
    }
}

/// Highest play count among `candidates`, first one wins a tie.
fn favorite_candidate(catalog: &[Track], candidates: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &index in candidates {
        match best {
            Some(current) if catalog[index].play_count <= catalog[current].play_count => {}
            _ => best = Some(index),
        }
    }
    best
}
