//! "Now playing" surface: current title, artist and state, plus the three
//! transport actions it offers.

use crate::session::{PlayState, PlayerEvent};
use crate::track::{format_duration, Track};
use std::fmt;

/// Transport action offered next to the now-playing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Previous,
    PlayPause,
    Next,
}

impl From<NotificationAction> for PlayerEvent {
    fn from(action: NotificationAction) -> Self {
        match action {
            NotificationAction::Previous => PlayerEvent::Previous,
            NotificationAction::PlayPause => PlayerEvent::TogglePlayPause,
            NotificationAction::Next => PlayerEvent::Next,
        }
    }
}

/// Snapshot of what is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub index: usize,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub state: PlayState,
}

impl NowPlaying {
    #[must_use]
    pub fn new(index: usize, track: &Track, state: PlayState) -> Self {
        Self {
            index,
            title: track.title.clone(),
            artist: track.display_artist().to_string(),
            duration_ms: track.duration_ms,
            state,
        }
    }

    /// Actions in display order, with the label each one shows right now.
    #[must_use]
    pub fn actions(&self) -> [(NotificationAction, &'static str); 3] {
        let toggle = if self.state == PlayState::Playing { "Pause" } else { "Play" };
        [
            (NotificationAction::Previous, "Previous"),
            (NotificationAction::PlayPause, toggle),
            (NotificationAction::Next, "Next"),
        ]
    }
}

impl fmt::Display for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.state {
            PlayState::Playing => "▶",
            PlayState::Paused => "⏸",
            PlayState::Stopped => "■",
        };
        write!(
            f,
            "{symbol} #{} {} - {} [{}]   ",
            self.index,
            self.title,
            self.artist,
            format_duration(self.duration_ms)
        )?;

        let keys = ["p", "space", "n"];
        let labels: Vec<String> = self
            .actions()
            .iter()
            .zip(keys)
            .map(|((_, label), key)| format!("[{key}] {label}"))
            .collect();
        write!(f, "{}", labels.join("  "))
    }
}
