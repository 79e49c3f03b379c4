//! List cache throughput: stitching windows and scrolling a long list

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use surface_sync::protocol::{ListWindow, WireItem};
use surface_sync::state::{ListCache, ListKind};

const TOTAL: usize = 512;
const WINDOW: usize = 16;

fn window(start: usize) -> ListWindow {
    ListWindow {
        kind: ListKind::Tracks,
        start_index: start,
        items: (start..(start + WINDOW).min(TOTAL))
            .map(|i| WireItem::named(format!("Track {}", i + 1)))
            .collect(),
        total_count: TOTAL,
        is_nested: false,
        current_index: 0,
    }
}

fn loaded_cache() -> ListCache {
    let mut cache = ListCache::new(ListKind::Tracks, TOTAL);
    for start in (0..TOTAL).step_by(WINDOW) {
        let _ = cache.apply_window(&window(start));
    }
    cache
}

fn bench_apply_windows(c: &mut Criterion) {
    let windows: Vec<ListWindow> = (0..TOTAL).step_by(WINDOW).map(window).collect();

    c.bench_function("apply_window full list", |b| {
        b.iter(|| {
            let mut cache = ListCache::new(ListKind::Tracks, TOTAL);
            for w in &windows {
                let _ = black_box(cache.apply_window(w));
            }
            cache
        })
    });
}

fn bench_navigate(c: &mut Criterion) {
    let mut cache = loaded_cache();

    c.bench_function("navigate wrapping", |b| {
        b.iter(|| {
            for delta in [1, 7, -3, -40, 300] {
                let _ = black_box(cache.navigate(delta, 4));
            }
        })
    });
}

criterion_group!(benches, bench_apply_windows, bench_navigate);
criterion_main!(benches);
