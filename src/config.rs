//! # Configuration Module
//!
//! Data directory layout and the optional `config.json`.
//!
//! ## Data Storage
//!
//! Everything lives in the platform data directory:
//! - Linux: `~/.local/share/offplay/`
//! - macOS: `~/Library/Application Support/offplay/`
//! - Windows: `%APPDATA%/offplay/`
//!
//! ```text
//! offplay/
//! ├── music.db       # catalog, play counts, playback history
//! └── config.json    # optional player settings
//! ```
//!
//! Every field of `config.json` is optional; a missing file means defaults.

use crate::scanner::DEFAULT_SCAN_DEPTH;
use crate::selector::ShuffleConfig;
use crate::session::{PlayMode, SessionConfig};
use crate::stats::QUICK_SKIP_MS;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "offplay";
const DB_FILE: &str = "music.db";
const CONFIG_FILE: &str = "config.json";

/// `<platform data dir>/offplay`, created if needed.
///
/// # Errors
///
/// Fails when the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Pass --db and --config explicitly."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Player settings read from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Library scanned by `play --rescan` and `scan` without a path.
    pub music_dir: Option<PathBuf>,
    pub scan_depth: u32,
    /// Delete songs that vanished from the library when rescanning.
    pub prune_missing: bool,
    /// Switching away before this many milliseconds counts as a quick skip.
    pub quick_skip_ms: u64,
    /// Clamped to the default (20) when the window is built.
    pub recency_capacity: usize,
    pub random_picks_per_favorite: u32,
    /// Play in catalog order instead of smart shuffle.
    pub sequential: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let shuffle = ShuffleConfig::default();
        Self {
            music_dir: None,
            scan_depth: DEFAULT_SCAN_DEPTH,
            prune_missing: false,
            quick_skip_ms: QUICK_SKIP_MS,
            recency_capacity: shuffle.recency_capacity,
            random_picks_per_favorite: shuffle.random_picks_per_favorite,
            sequential: false,
        }
    }
}

impl PlayerConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable file or invalid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        debug!("Loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty JSON. Refuses to overwrite an
    /// existing file unless `force` is set.
    pub fn write(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("Config file {} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    #[must_use]
    pub fn shuffle(&self) -> ShuffleConfig {
        ShuffleConfig {
            recency_capacity: self.recency_capacity,
            random_picks_per_favorite: self.random_picks_per_favorite,
        }
    }

    /// Session settings; `force_sequential` comes from the command line.
    #[must_use]
    pub fn session(&self, force_sequential: bool) -> SessionConfig {
        let mode = if self.sequential || force_sequential {
            PlayMode::Sequential
        } else {
            PlayMode::SmartShuffle
        };
        SessionConfig {
            mode,
            quick_skip_ms: self.quick_skip_ms,
            shuffle: self.shuffle(),
        }
    }
}

/// Paths resolved for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl RuntimeConfig {
    /// Explicit paths win; the rest default to the data directory.
    pub fn resolve(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self> {
        let db_path = match db {
            Some(path) => path,
            None => get_db_path()?,
        };
        let config_path = match config {
            Some(path) => path,
            None => get_config_path()?,
        };
        Ok(Self {
            db_path,
            config_path,
        })
    }
}
