//! # Interactive Runner
//!
//! Line-oriented front end for a [`PlayerSession`]. A reader thread turns
//! input lines into [`UserCommand`]s and sends them over a channel; the
//! loop on the calling thread owns the session, applies commands, polls for
//! natural completion every tick and prints the now-playing line whenever
//! it changes.
//!
//! ```text
//!  stdin thread ──UserCommand──▶ loop ──PlayerEvent──▶ PlayerSession
//!                                  ▲                        │
//!                                  └──── poll_completion ◀──┘
//! ```

use crate::catalog::{CatalogSource, PrunePolicy};
use crate::db::StatsStore;
use crate::notification::{NotificationAction, NowPlaying};
use crate::playback::Playback;
use crate::session::{PlayMode, PlayerEvent, PlayerSession};
use crate::track::format_duration;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How often the loop checks for natural completion.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

const HELP: &str = "\
Commands:
  n, next              next track
  p, prev              previous track
  <enter>, space, t    play / pause
  <number>             play that catalog index
  l, list              show the catalog
  r, rescan            rescan the music directory
  h, help              this help
  q, quit              quit";

/// A parsed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Player(PlayerEvent),
    List,
    Rescan,
    Help,
    Quit,
    Unrecognized,
}

impl From<NotificationAction> for UserCommand {
    fn from(action: NotificationAction) -> Self {
        Self::Player(action.into())
    }
}

/// Maps one line of input to a command.
#[must_use]
pub fn parse_line(line: &str) -> UserCommand {
    let line = line.trim().to_lowercase();
    match line.as_str() {
        "n" | "next" | "skip" => NotificationAction::Next.into(),
        "p" | "prev" | "previous" => NotificationAction::Previous.into(),
        "" | "space" | "t" | "pause" | "play" => NotificationAction::PlayPause.into(),
        "l" | "list" | "ls" => UserCommand::List,
        "r" | "rescan" | "refresh" => UserCommand::Rescan,
        "h" | "help" | "?" => UserCommand::Help,
        "q" | "quit" | "exit" | "stop" => UserCommand::Quit,
        other => match other.parse::<usize>() {
            Ok(index) => UserCommand::Player(PlayerEvent::PlayIndex(index)),
            Err(_) => UserCommand::Unrecognized,
        },
    }
}

/// Options for [`run`].
pub struct RunOptions<'a> {
    /// Catalog index to start with; otherwise play/pause picks one.
    pub start: Option<usize>,
    /// Source for the `rescan` command, if a music directory is known.
    pub source: Option<&'a dyn CatalogSource>,
    pub prune: PrunePolicy,
    pub tick: Duration,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            start: None,
            source: None,
            prune: PrunePolicy::Keep,
            tick: DEFAULT_TICK,
        }
    }
}

/// Runs the player until `quit` or end of input. Playback is stopped on
/// return; the track playing at that point is not finalized.
///
/// # Errors
///
/// Fails only when writing to `out` fails.
pub fn run<P, S, R, W>(
    session: &mut PlayerSession<P, S>,
    input: R,
    out: &mut W,
    options: &RunOptions<'_>,
) -> Result<()>
where
    P: Playback,
    S: StatsStore,
    R: BufRead + Send + 'static,
    W: Write,
{
    let (tx, rx) = mpsc::channel();
    spawn_reader(input, tx);

    let mode = match session.mode() {
        PlayMode::SmartShuffle => "smart shuffle",
        PlayMode::Sequential => "in order",
    };
    writeln!(
        out,
        "{} tracks, {mode}. Type `h` for help.",
        session.catalog().len()
    )?;

    let first = options
        .start
        .map_or(PlayerEvent::TogglePlayPause, PlayerEvent::PlayIndex);
    session.handle(first);

    let mut shown: Option<NowPlaying> = None;
    render(session, out, &mut shown)?;

    loop {
        match rx.recv_timeout(options.tick) {
            Ok(UserCommand::Quit) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Leaving the player");
                break;
            }
            Ok(UserCommand::Player(event)) => session.handle(event),
            Ok(UserCommand::List) => print_catalog(session, out)?,
            Ok(UserCommand::Rescan) => match options.source {
                Some(source) => session.rescan(source, options.prune),
                None => writeln!(out, "No music directory configured, cannot rescan.")?,
            },
            Ok(UserCommand::Help) => writeln!(out, "{HELP}")?,
            Ok(UserCommand::Unrecognized) => {
                writeln!(out, "Unrecognized command. Type `h` for help.")?;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        if let Some(completed) = session.poll_completion() {
            debug!("Track finished on its own");
            session.handle(completed);
        }

        render(session, out, &mut shown)?;
    }

    session.stop();
    out.flush()?;
    Ok(())
}

fn spawn_reader<R: BufRead + Send + 'static>(input: R, tx: mpsc::Sender<UserCommand>) {
    thread::spawn(move || {
        for line in input.lines() {
            let command = match line {
                Ok(line) => parse_line(&line),
                Err(e) => {
                    warn!("Failed to read input: {e}");
                    UserCommand::Quit
                }
            };
            let quit = command == UserCommand::Quit;
            if tx.send(command).is_err() || quit {
                return;
            }
        }
    });
}

/// Prints the status message and, if it changed, the now-playing line.
fn render<P, S, W>(
    session: &mut PlayerSession<P, S>,
    out: &mut W,
    shown: &mut Option<NowPlaying>,
) -> Result<()>
where
    P: Playback,
    S: StatsStore,
    W: Write,
{
    if let Some(status) = session.take_status() {
        writeln!(out, "! {status}")?;
    }

    let now = session.now_playing();
    if now != *shown {
        match &now {
            Some(line) => writeln!(out, "{line}")?,
            None => writeln!(out, "■ Stopped")?,
        }
        out.flush().context("Failed to write to the terminal")?;
        *shown = now;
    }
    Ok(())
}

fn print_catalog<P, S, W>(session: &PlayerSession<P, S>, out: &mut W) -> Result<()>
where
    P: Playback,
    S: StatsStore,
    W: Write,
{
    let current = session.current_index();
    for (index, track) in session.catalog().iter().enumerate() {
        let marker = if Some(index) == current { '>' } else { ' ' };
        writeln!(
            out,
            "{marker}{index:>4}  {:<40} {:<24} {:>6}  plays {}",
            track.title,
            track.display_artist(),
            format_duration(track.duration_ms),
            track.play_count
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::playback::SilentPlayback;
    use crate::session::SessionConfig;
    use crate::track::{ScannedTrack, Track};
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("n"), UserCommand::Player(PlayerEvent::Next));
        assert_eq!(parse_line(" Prev "), UserCommand::Player(PlayerEvent::Previous));
        assert_eq!(parse_line(""), UserCommand::Player(PlayerEvent::TogglePlayPause));
        assert_eq!(parse_line("12"), UserCommand::Player(PlayerEvent::PlayIndex(12)));
        assert_eq!(parse_line("exit"), UserCommand::Quit);
        assert_eq!(parse_line("l"), UserCommand::List);
        assert_eq!(parse_line("dance"), UserCommand::Unrecognized);
    }

    fn file_track(dir: &Path, id: i64, title: &str) -> Track {
        let locator = dir.join(format!("{title}.mp3"));
        std::fs::write(&locator, b"x").unwrap();
        Track::from_scan(ScannedTrack {
            id,
            title: title.to_string(),
            artist: "Band".to_string(),
            duration_ms: 180_000,
            locator,
        })
    }

    #[test]
    fn test_scripted_session() -> Result<()> {
        let dir = TempDir::new()?;
        let catalog = vec![
            file_track(dir.path(), 1, "First"),
            file_track(dir.path(), 2, "Second"),
        ];
        let mut store = SqliteStore::open_in_memory()?;
        store.upsert_tracks(&catalog)?;

        let config = SessionConfig {
            mode: PlayMode::Sequential,
            ..SessionConfig::default()
        };
        let mut session = PlayerSession::new(catalog, SilentPlayback::new(), store, config);

        let script = Cursor::new(b"n\nl\nbogus\nq\n".to_vec());
        let mut out = Vec::new();
        let options = RunOptions {
            tick: Duration::from_millis(5),
            ..RunOptions::default()
        };
        run(&mut session, script, &mut out, &options)?;

        let text = String::from_utf8(out)?;
        assert!(text.starts_with("2 tracks, in order."));
        assert!(text.contains("▶ #0 First - Band"));
        assert!(text.contains("▶ #1 Second - Band"));
        assert!(text.contains(">   1  Second"));
        assert!(text.contains("Unrecognized command"));

        // The quick skip away from "First" was recorded, nothing was logged.
        assert_eq!(session.store().history_count(1)?, 0);
        assert!(!session.is_loaded());
        Ok(())
    }

    #[test]
    fn test_end_of_input_quits() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let mut session =
            PlayerSession::new(Vec::new(), SilentPlayback::new(), store, SessionConfig::default());
        let mut out = Vec::new();

        run(&mut session, Cursor::new(Vec::new()), &mut out, &RunOptions::default())?;

        let text = String::from_utf8(out)?;
        assert!(text.starts_with("0 tracks, smart shuffle."));
        Ok(())
    }
}
