use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info, warn};
use offplay::catalog::{self, PrunePolicy};
use offplay::cli::{self, Command};
use offplay::completion;
use offplay::config::{PlayerConfig, RuntimeConfig};
use offplay::db::SqliteStore;
use offplay::playback;
use offplay::runner::{self, RunOptions};
use offplay::scanner::FsCatalog;
use offplay::selector::NextTrackSelector;
use offplay::session::PlayerSession;
use offplay::track::{format_duration, sort_by_title, Track};
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let runtime = RuntimeConfig::resolve(args.db, args.config)?;
    debug!("Using {runtime:?}");

    match args.command {
        Command::Scan {
            path,
            scan_depth,
            prune,
        } => {
            let config = PlayerConfig::load(&runtime.config_path)?;
            let root = music_dir(path, &config)?;
            let depth = scan_depth.unwrap_or(config.scan_depth);
            let policy = prune_policy(prune || config.prune_missing);

            info!("Scanning {} (depth {depth}, {policy:?})", root.display());
            let source = FsCatalog::new(&root, depth)?;
            let mut store = SqliteStore::open(&runtime.db_path)?;
            let tracks = catalog::refresh(&source, &mut store, policy)?;

            if tracks.is_empty() {
                println!("No audio files found under {}", source.root().display());
            } else {
                println!("Catalogued {} tracks from {}", tracks.len(), source.root().display());
            }
        }
        Command::List { json } => {
            let store = SqliteStore::open(&runtime.db_path)?;
            let mut tracks = catalog::load_cached(&store)?;
            sort_by_title(&mut tracks);

            if json {
                println!("{}", serde_json::to_string_pretty(&tracks)?);
            } else {
                print_tracks(&tracks)?;
            }
        }
        Command::Play {
            sequential,
            start,
            rescan,
            silent,
        } => {
            let config = PlayerConfig::load(&runtime.config_path)?;
            let mut store = SqliteStore::open(&runtime.db_path)?;
            let policy = prune_policy(config.prune_missing);

            let source = match &config.music_dir {
                Some(dir) => match FsCatalog::new(dir, config.scan_depth) {
                    Ok(source) => Some(source),
                    Err(e) if !rescan => {
                        warn!("Rescanning disabled: {e:#}");
                        None
                    }
                    Err(e) => return Err(e),
                },
                None => None,
            };

            let mut tracks = match (&source, rescan) {
                (Some(source), true) => catalog::refresh(source, &mut store, policy)?,
                (None, true) => bail!(
                    "`--rescan` needs `music_dir` in {}",
                    runtime.config_path.display()
                ),
                (_, false) => catalog::load_cached(&store)?,
            };
            if tracks.is_empty() {
                bail!("No songs in the catalog. Run `offplay scan <DIR>` first.");
            }
            sort_by_title(&mut tracks);

            let backend = playback::open_backend(silent)?;
            let mut session = PlayerSession::new(tracks, backend, store, config.session(sequential));

            let options = RunOptions {
                start,
                source: source.as_ref().map(|s| s as &dyn catalog::CatalogSource),
                prune: policy,
                ..RunOptions::default()
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            runner::run(&mut session, BufReader::new(io::stdin()), &mut out, &options)?;
        }
        Command::Suggest { count } => {
            let config = PlayerConfig::load(&runtime.config_path)?;
            let store = SqliteStore::open(&runtime.db_path)?;
            let mut tracks = catalog::load_cached(&store)?;
            sort_by_title(&mut tracks);

            let mut selector = NextTrackSelector::new(config.shuffle());
            for n in 1..=count {
                let Some(pick) = selector.pick_next(&tracks) else {
                    println!("The catalog is empty.");
                    break;
                };
                let track = &tracks[pick.index];
                println!(
                    "{n:>3}. {} - {} ({:?}, plays {}{})",
                    track.title,
                    track.display_artist(),
                    pick.mode,
                    track.play_count,
                    if pick.exhausted { ", window reset" } else { "" }
                );
            }
        }
        Command::History { limit, json } => {
            let store = SqliteStore::open(&runtime.db_path)?;
            let entries = store.recent_history(limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No playback history yet.");
            } else {
                for entry in entries {
                    let title = entry.title.as_deref().unwrap_or("<removed song>");
                    let artist = entry
                        .artist
                        .as_deref()
                        .filter(|a| !a.is_empty())
                        .unwrap_or("Unknown artist");
                    println!("{:>6}  {}  {title} - {artist}", entry.entry_id, entry.timestamp);
                }
            }
        }
        Command::Config { init } => {
            if init {
                PlayerConfig::default().write(&runtime.config_path, false)?;
                println!("Wrote default config to {}", runtime.config_path.display());
            } else {
                let config = PlayerConfig::load(&runtime.config_path)?;
                println!("# config:   {}", runtime.config_path.display());
                println!("# database: {}", runtime.db_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            let shell = completion::shell_to_completion_shell(shell);
            completion::generate_completions(shell, &mut cmd, &mut io::stdout());
        }
    }

    Ok(())
}

fn music_dir(path: Option<PathBuf>, config: &PlayerConfig) -> Result<PathBuf> {
    path.or_else(|| config.music_dir.clone())
        .context("No music directory given and no `music_dir` in the config")
}

fn prune_policy(prune: bool) -> PrunePolicy {
    if prune {
        PrunePolicy::Prune
    } else {
        PrunePolicy::Keep
    }
}

fn print_tracks(tracks: &[Track]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (index, track) in tracks.iter().enumerate() {
        writeln!(
            out,
            "{index:>4}  {:<40} {:<24} {:>6}  plays {}",
            track.title,
            track.display_artist(),
            format_duration(track.duration_ms),
            track.play_count
        )?;
    }
    writeln!(out, "{} tracks", tracks.len())?;
    Ok(())
}
