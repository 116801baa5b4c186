//! # offplay Benchmarks
//!
//! Hot paths of the player: next-track selection over catalogs of growing
//! size, scan reconciliation, and the finalizer against SQLite.
//!
//! ```bash
//! cargo bench
//! cargo bench selector
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use offplay::catalog;
use offplay::db::{SqliteStore, StatsStore};
use offplay::selector::{NextTrackSelector, ShuffleConfig};
use offplay::stats::{self, EndReason, QUICK_SKIP_MS};
use offplay::track::{ScannedTrack, Track};
use std::hint::black_box;
use std::path::PathBuf;

fn scanned_tracks(count: usize) -> Vec<ScannedTrack> {
    (1..=count)
        .map(|i| ScannedTrack {
            id: i as i64,
            title: format!("Song {i:04}"),
            artist: format!("Artist {}", (i - 1) / 20 + 1),
            duration_ms: 120_000 + (i as u64 % 180) * 1000,
            locator: PathBuf::from(format!("/music/test/song{i:04}.flac")),
        })
        .collect()
}

fn catalog_tracks(count: usize) -> Vec<Track> {
    scanned_tracks(count)
        .into_iter()
        .enumerate()
        .map(|(i, scanned)| Track::with_stats(scanned, (i % 50) as u32, 0))
        .collect()
}

fn benchmark_selector(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector");

    for size in [10, 100, 1000, 10_000] {
        let tracks = catalog_tracks(size);
        group.bench_with_input(BenchmarkId::new("pick_next", size), &tracks, |b, tracks| {
            let mut selector = NextTrackSelector::seeded(ShuffleConfig::default(), 7);
            b.iter(|| selector.pick_next(black_box(tracks)));
        });
    }

    // Twenty picks in a row fill the window; the next ones hit exhaustion.
    let small = catalog_tracks(20);
    group.bench_function("pick_next_exhausting", |b| {
        let mut selector = NextTrackSelector::seeded(ShuffleConfig::default(), 7);
        b.iter(|| selector.pick_next(black_box(&small)));
    });

    group.finish();
}

fn benchmark_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [100, 1000, 10_000] {
        let persisted = catalog_tracks(size);
        let scanned = scanned_tracks(size);
        group.bench_with_input(BenchmarkId::new("merge", size), &persisted, |b, persisted| {
            b.iter_batched(
                || scanned.clone(),
                |scanned| catalog::reconcile(scanned, black_box(persisted)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_finalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalizer");

    let tracks = catalog_tracks(100);
    let mut store = SqliteStore::open_in_memory().expect("Failed to open database");
    store.upsert_tracks(&tracks).expect("Failed to seed database");

    group.bench_function("completed", |b| {
        let mut track = tracks[0].clone();
        b.iter(|| {
            stats::finalize_play(
                &mut store,
                &mut track,
                black_box(200_000),
                EndReason::Completed,
                1_800_000_000_000,
                QUICK_SKIP_MS,
            )
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_selector, benchmark_reconcile, benchmark_finalizer);
criterion_main!(benches);
