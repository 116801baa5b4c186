//! # Playback Primitive
//!
//! A single-item player: load one track, start/pause it, ask for the
//! position, and find out when it ended on its own. Loading always tears
//! down whatever was loaded before.
//!
//! Two backends:
//!
//! - [`SilentPlayback`] keeps time against the wall clock and the track's
//!   catalogued duration without producing sound. Used for dry runs and
//!   builds without the `audio` feature.
//! - `RodioPlayback` (feature `audio`) decodes and plays through the default
//!   output device.

use crate::track::Track;
use anyhow::{ensure, Result};
use log::debug;
use std::time::{Duration, Instant};

/// Playback primitive driven by the session.
pub trait Playback {
    /// Resets the previous episode and prepares `track`, paused at zero.
    ///
    /// # Errors
    ///
    /// Fails on a bad locator or an undecodable file; nothing is loaded then.
    fn load(&mut self, track: &Track) -> Result<()>;

    fn start(&mut self);

    fn pause(&mut self);

    /// Elapsed position of the loaded track in milliseconds.
    fn position_ms(&self) -> u64;

    /// True once the loaded track has played to its natural end.
    fn is_finished(&self) -> bool;

    /// Drops the loaded track.
    fn stop(&mut self);
}

impl<P: Playback + ?Sized> Playback for Box<P> {
    fn load(&mut self, track: &Track) -> Result<()> {
        (**self).load(track)
    }

    fn start(&mut self) {
        (**self).start();
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn position_ms(&self) -> u64 {
        (**self).position_ms()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Clock-driven backend that makes no sound.
///
/// Tracks with an unknown (zero) duration never finish on their own.
#[derive(Debug, Default)]
pub struct SilentPlayback {
    duration: Option<Duration>,
    played: Duration,
    resumed_at: Option<Instant>,
}

impl SilentPlayback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn elapsed(&self) -> Duration {
        let running = self.resumed_at.map(|at| at.elapsed()).unwrap_or_default();
        self.played + running
    }
}

impl Playback for SilentPlayback {
    fn load(&mut self, track: &Track) -> Result<()> {
        self.stop();
        ensure!(
            track.locator().exists(),
            "Cannot play `{}': {} does not exist",
            track.title,
            track.locator().display()
        );
        self.duration = Some(Duration::from_millis(track.duration_ms));
        debug!("Silently loaded `{}' ({}ms)", track.title, track.duration_ms);
        Ok(())
    }

    fn start(&mut self) {
        if self.duration.is_some() && self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(at) = self.resumed_at.take() {
            self.played += at.elapsed();
        }
    }

    fn position_ms(&self) -> u64 {
        let elapsed = self.elapsed();
        let capped = match self.duration {
            Some(total) if !total.is_zero() => elapsed.min(total),
            _ => elapsed,
        };
        u64::try_from(capped.as_millis()).unwrap_or(u64::MAX)
    }

    fn is_finished(&self) -> bool {
        match self.duration {
            Some(total) if !total.is_zero() => self.elapsed() >= total,
            _ => false,
        }
    }

    fn stop(&mut self) {
        self.duration = None;
        self.played = Duration::ZERO;
        self.resumed_at = None;
    }
}

#[cfg(feature = "audio")]
pub use self::audio::RodioPlayback;

#[cfg(feature = "audio")]
mod audio {
    use super::Playback;
    use crate::track::Track;
    use anyhow::{Context, Result};
    use log::debug;
    use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
    use std::fs::File;
    use std::io::BufReader;

    /// Plays through the default output device.
    pub struct RodioPlayback {
        // Must outlive every sink created from its mixer.
        stream: OutputStream,
        sink: Option<Sink>,
    }

    impl RodioPlayback {
        pub fn new() -> Result<Self> {
            let stream = OutputStreamBuilder::open_default_stream()
                .context("Failed to open the default audio output")?;
            Ok(Self { stream, sink: None })
        }
    }

    impl Playback for RodioPlayback {
        fn load(&mut self, track: &Track) -> Result<()> {
            self.stop();

            let file = File::open(track.locator())
                .with_context(|| format!("Failed to open {}", track.locator().display()))?;
            let decoder = Decoder::new(BufReader::new(file))
                .with_context(|| format!("Failed to decode `{}'", track.title))?;

            let sink = Sink::connect_new(self.stream.mixer());
            sink.pause();
            sink.append(decoder);
            self.sink = Some(sink);

            debug!("Loaded `{}' into rodio sink", track.title);
            Ok(())
        }

        fn start(&mut self) {
            if let Some(sink) = &self.sink {
                sink.play();
            }
        }

        fn pause(&mut self) {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
        }

        fn position_ms(&self) -> u64 {
            self.sink
                .as_ref()
                .map(|sink| u64::try_from(sink.get_pos().as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0)
        }

        fn is_finished(&self) -> bool {
            self.sink.as_ref().is_some_and(Sink::empty)
        }

        fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
        }
    }
}

/// Picks the backend for interactive play: real audio when built with the
/// `audio` feature, unless `silent` is requested.
pub fn open_backend(silent: bool) -> Result<Box<dyn Playback>> {
    #[cfg(feature = "audio")]
    {
        if !silent {
            return Ok(Box::new(RodioPlayback::new()?));
        }
    }
    #[cfg(not(feature = "audio"))]
    {
        if !silent {
            log::info!("Built without the `audio` feature, playing silently");
        }
    }
    Ok(Box::new(SilentPlayback::new()))
}
