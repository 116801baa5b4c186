//! Short-term memory of recently played tracks.

use crate::track::TrackId;
use std::collections::VecDeque;

/// Default number of identifiers remembered.
pub const DEFAULT_CAPACITY: usize = 20;

/// Bounded, duplicate-free window of recently played identifiers,
/// most recent last.
///
/// Recording an identifier that is already present moves it to the end
/// instead of growing the window. Once full, the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct RecencyWindow {
    ids: VecDeque<TrackId>,
    capacity: usize,
}

impl Default for RecencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecencyWindow {
    /// The capacity is clamped to `1..=DEFAULT_CAPACITY`: zero still
    /// records one identifier, and the window never outgrows the default.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, DEFAULT_CAPACITY);
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, id: TrackId) {
        if let Some(pos) = self.ids.iter().position(|&existing| existing == id) {
            self.ids.remove(pos);
        }
        self.ids.push_back(id);
        while self.ids.len() > self.capacity {
            self.ids.pop_front();
        }
    }

    #[must_use]
    pub fn contains(&self, id: TrackId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.ids.iter().copied()
    }

    #[must_use]
    pub fn most_recent(&self) -> Option<TrackId> {
        self.ids.back().copied()
    }
}
