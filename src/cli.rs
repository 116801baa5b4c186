//! # Command Line Interface
//!
//! Argument definitions for `offplay`, built with clap's derive API.
//!
//! ```bash
//! offplay scan ~/Music                # scan a library into the database
//! offplay play                        # smart shuffle over the catalog
//! offplay play --sequential --start 3
//! offplay suggest --count 10          # what the selector would pick
//! offplay history --limit 20
//! offplay completion fish > ~/.config/fish/completions/offplay.fish
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shells supported by `offplay completion`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
#[command(name = "offplay")]
#[command(about = "Offline music player with a smart shuffle that learns from your skips")]
#[command(version)]
pub struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "OFFPLAY_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the platform data directory)
    #[arg(long, global = true, env = "OFFPLAY_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a music directory and merge it into the catalog
    Scan {
        /// Music directory; defaults to `music_dir` from the config
        #[arg(value_hint = clap::ValueHint::DirPath)]
        path: Option<PathBuf>,

        /// Maximum directory depth to descend
        #[arg(long)]
        scan_depth: Option<u32>,

        /// Remove songs that are no longer found (history is kept)
        #[arg(long)]
        prune: bool,
    },

    /// List the catalog, sorted by title
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Start the interactive player
    Play {
        /// Play in catalog order instead of smart shuffle
        #[arg(long)]
        sequential: bool,

        /// Start with this catalog index
        #[arg(long, value_name = "INDEX")]
        start: Option<usize>,

        /// Rescan `music_dir` before playing
        #[arg(long)]
        rescan: bool,

        /// Keep time without producing sound
        #[arg(long)]
        silent: bool,
    },

    /// Show what the smart shuffle would play next, without playing
    Suggest {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Show recent playback history, newest first
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write a config file with the defaults
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completion { shell: Shell },
}
