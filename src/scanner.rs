//! # Filesystem Catalog Source
//!
//! Walks a music directory for audio files and probes each one for title,
//! artist and duration with symphonia. Probing runs in parallel on the rayon
//! pool; the walk itself is sequential and depth-limited.
//!
//! Symlinked directories are not followed, so a link loop cannot list the
//! same song twice. Symlinked files are kept. Unreadable entries are logged
//! and skipped.
//!
//! A file that cannot be probed is still catalogued, titled after its file
//! name, so a broken tag never hides a song.

use crate::catalog::CatalogSource;
use crate::track::{ScannedTrack, TrackId};
use anyhow::{ensure, Context, Result};
use log::{info, warn};
use path_absolutize::Absolutize;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use walkdir::{DirEntry, WalkDir};

/// Extensions treated as music.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "m4a", "wav"];

/// Default recursion limit for the directory walk.
pub const DEFAULT_SCAN_DEPTH: u32 = 10;

/// Catalog source backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
    max_depth: u32,
}

impl FsCatalog {
    /// Resolves `root` to an absolute path so locators and identifiers do not
    /// depend on the working directory.
    ///
    /// # Errors
    ///
    /// Fails if the path cannot be resolved or is not a directory.
    pub fn new(root: &Path, max_depth: u32) -> Result<Self> {
        let root = root
            .absolutize()
            .with_context(|| format!("Failed to resolve music directory {}", root.display()))?
            .into_owned();

        ensure!(root.exists(), "Music directory `{}` does not exist!", root.display());
        ensure!(root.is_dir(), "Argument `{}` is not a directory!", root.display());

        Ok(Self { root, max_depth })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CatalogSource for FsCatalog {
    fn scan(&self) -> Result<Vec<ScannedTrack>> {
        let files = self.audio_files();
        info!("Found {} audio files under {}", files.len(), self.root.display());

        let mut tracks: Vec<ScannedTrack> = files.into_par_iter().map(probe_file).collect();
        tracks.sort_by_cached_key(|t| t.title.to_lowercase());
        Ok(tracks)
    }
}

impl FsCatalog {
    /// Audio files under the root. Files directly in the root are at depth
    /// one, so `max_depth` counts the subdirectory levels below it.
    fn audio_files(&self) -> Vec<PathBuf> {
        let max_depth = usize::try_from(self.max_depth)
            .unwrap_or(usize::MAX)
            .saturating_add(1);

        WalkDir::new(&self.root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| is_regular_file(entry) && is_audio_file(entry.path()))
            .map(DirEntry::into_path)
            .collect()
    }
}

fn is_regular_file(entry: &DirEntry) -> bool {
    if entry.path_is_symlink() {
        // Links to directories are not descended into; links to files count.
        entry.path().is_file()
    } else {
        entry.file_type().is_file()
    }
}

/// Whether the extension is one of [`AUDIO_EXTENSIONS`], ignoring case.
#[must_use]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Stable identifier for a locator: 64-bit FNV-1a of the path bytes,
/// masked to stay a non-negative SQLite integer.
#[must_use]
pub fn stable_id(path: &Path) -> TrackId {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = path
        .to_string_lossy()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    (hash & (i64::MAX as u64)) as TrackId
}

fn probe_file(path: PathBuf) -> ScannedTrack {
    let fallback_title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let probed = match read_metadata(&path) {
        Ok(probed) => probed,
        Err(e) => {
            warn!("Could not read tags of {}: {e:#}", path.display());
            ProbedMetadata::default()
        }
    };

    ScannedTrack {
        id: stable_id(&path),
        title: probed.title.filter(|t| !t.trim().is_empty()).unwrap_or(fallback_title),
        artist: probed.artist.unwrap_or_default(),
        duration_ms: probed.duration_ms.unwrap_or(0),
        locator: path,
    }
}

#[derive(Debug, Default)]
struct ProbedMetadata {
    title: Option<String>,
    artist: Option<String>,
    duration_ms: Option<u64>,
}

fn read_metadata(path: &Path) -> Result<ProbedMetadata> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Unsupported or corrupt audio file")?;

    let mut out = ProbedMetadata::default();

    // Tags found while probing (ID3 in front of MP3s), then container tags.
    if let Some(rev) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        apply_tags(&mut out, rev);
    }
    if let Some(rev) = probed.format.metadata().current() {
        apply_tags(&mut out, rev);
    }

    if let Some(track) = probed.format.default_track() {
        let params = &track.codec_params;
        out.duration_ms = match (params.n_frames, params.time_base, params.sample_rate) {
            (Some(frames), Some(tb), _) => {
                let time = tb.calc_time(frames);
                Some(time.seconds * 1000 + (time.frac * 1000.0) as u64)
            }
            (Some(frames), None, Some(rate)) if rate > 0 => Some(frames * 1000 / u64::from(rate)),
            _ => None,
        };
    }

    Ok(out)
}

fn apply_tags(out: &mut ProbedMetadata, rev: &MetadataRevision) {
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if out.title.is_none() => {
                out.title = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Artist) if out.artist.is_none() => {
                out.artist = Some(tag.value.to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("/m/a.mp3")));
        assert!(is_audio_file(Path::new("/m/a.FLAC")));
        assert!(!is_audio_file(Path::new("/m/cover.jpg")));
        assert!(!is_audio_file(Path::new("/m/noext")));
    }

    #[test]
    fn test_stable_id_is_deterministic_and_non_negative() {
        let a = stable_id(Path::new("/music/a.mp3"));
        assert_eq!(a, stable_id(Path::new("/music/a.mp3")));
        assert_ne!(a, stable_id(Path::new("/music/b.mp3")));
        assert!(a >= 0);
    }

    #[test]
    fn test_unreadable_files_are_still_catalogued() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("zeta.mp3"), b"not really audio")?;
        std::fs::write(dir.path().join("Alpha.flac"), b"also not audio")?;
        std::fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let catalog = FsCatalog::new(dir.path(), DEFAULT_SCAN_DEPTH)?;
        let tracks = catalog.scan()?;

        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "zeta"]);
        assert!(tracks.iter().all(|t| t.duration_ms == 0 && t.artist.is_empty()));
        assert!(tracks.iter().all(|t| t.locator.is_absolute()));
        Ok(())
    }

    #[test]
    fn test_scan_depth_limit() -> Result<()> {
        let dir = TempDir::new()?;
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested)?;
        std::fs::write(dir.path().join("a").join("shallow.mp3"), b"x")?;
        std::fs::write(nested.join("deep.mp3"), b"x")?;

        let shallow = FsCatalog::new(dir.path(), 1)?.scan()?;
        assert_eq!(shallow.len(), 1);
        assert_eq!(shallow[0].title, "shallow");

        let deep = FsCatalog::new(dir.path(), DEFAULT_SCAN_DEPTH)?.scan()?;
        assert_eq!(deep.len(), 2);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_not_followed() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("song.mp3"), b"x")?;
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop"))?;

        let tracks = FsCatalog::new(dir.path(), DEFAULT_SCAN_DEPTH)?.scan()?;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "song");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_catalogued() -> Result<()> {
        let dir = TempDir::new()?;
        let elsewhere = TempDir::new()?;
        let target = elsewhere.path().join("linked.flac");
        std::fs::write(&target, b"x")?;
        std::os::unix::fs::symlink(&target, dir.path().join("linked.flac"))?;

        let tracks = FsCatalog::new(dir.path(), DEFAULT_SCAN_DEPTH)?.scan()?;
        assert_eq!(tracks.len(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_does_not_fail_scan() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("kept.mp3"), b"x")?;
        let locked = dir.path().join("lost+found");
        std::fs::create_dir(&locked)?;
        std::fs::write(locked.join("hidden.mp3"), b"x")?;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))?;

        let result = FsCatalog::new(dir.path(), DEFAULT_SCAN_DEPTH)?.scan();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))?;

        // Root ignores the permission bits and also sees `hidden`.
        let titles: Vec<String> = result?.into_iter().map(|t| t.title).collect();
        assert!(titles.contains(&"kept".to_string()));
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(FsCatalog::new(&dir.path().join("nope"), 3).is_err());
    }
}
