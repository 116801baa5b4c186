//! Offline music player with a smart shuffle that learns from listening
//! habits.
//!
//! Every finished episode adjusts a track's play count: a quick skip
//! (switching away within 30 seconds) costs two plays, anything else earns
//! one and is written to the playback history. The smart shuffle mixes
//! uniform random picks with a periodic pick of the most played track,
//! while a recency window keeps the last 20 tracks out of rotation.
//!
//! Core modules:
//! - [`selector`] - Next-track selection (smart shuffle)
//! - [`recency`] - Bounded recency window
//! - [`stats`] - Play-count finalizer
//! - [`catalog`] - Scan/statistics reconciliation
//! - [`session`] - Player state machine
//! - [`db`] - SQLite persistence
//!
//! ### Supporting Modules
//!
//! - [`track`] - Shared data types
//! - [`scanner`] - Filesystem catalog source with tag probing
//! - [`playback`] - Playback primitive and backends
//! - [`notification`] - Now-playing line and its actions
//! - [`runner`] - Interactive line-driven front end
//! - [`config`] - Data directory and `config.json`
//! - [`cli`] - Command-line interface definitions with clap
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use offplay::catalog::{self, PrunePolicy};
//! use offplay::db::SqliteStore;
//! use offplay::playback::SilentPlayback;
//! use offplay::scanner::{FsCatalog, DEFAULT_SCAN_DEPTH};
//! use offplay::session::{PlayerEvent, PlayerSession, SessionConfig};
//! use std::path::Path;
//!
//! let db_path = offplay::config::get_db_path()?;
//! let mut store = SqliteStore::open(&db_path)?;
//!
//! let source = FsCatalog::new(Path::new("/music"), DEFAULT_SCAN_DEPTH)?;
//! let tracks = catalog::refresh(&source, &mut store, PrunePolicy::Keep)?;
//!
//! let mut session = PlayerSession::new(tracks, SilentPlayback::new(), store, SessionConfig::default());
//! session.handle(PlayerEvent::TogglePlayPause);
//! if let Some(now) = session.now_playing() {
//!     println!("{now}");
//! }
//! session.handle(PlayerEvent::Next);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Logging
//!
//! The library logs through the `log` facade; the binary installs
//! `env_logger`, so `RUST_LOG=offplay::selector=debug offplay play` shows
//! every pick and why it was made.

pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod notification;
pub mod playback;
pub mod recency;
pub mod runner;
pub mod scanner;
pub mod selector;
pub mod session;
pub mod stats;
pub mod track;
