use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tilecluster::cluster::{ClusterBuilder, EquirectangularBackend};
use tilecluster::{
    Config, Coordinate, GeoBounds, ItemMarkerTiler, MAX_LEVEL, MarkerId, MarkerTiler,
    NonEmptyIterator, ScreenSize, TileIndex,
};

fn scattered_coordinates(count: usize) -> Vec<Coordinate> {
    let mut state: u64 = 7;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..count)
        .map(|_| Coordinate::new(next() * 160.0 - 80.0, next() * 350.0 - 175.0))
        .collect()
}

fn populated_tiler(count: usize) -> ItemMarkerTiler {
    let mut tiler = ItemMarkerTiler::new();
    for (i, c) in scattered_coordinates(count).into_iter().enumerate() {
        tiler.insert_marker(MarkerId(i as u64), c).unwrap();
    }
    tiler
}

fn benchmark_tile_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_index");
    let coordinate = Coordinate::new(48.8566, 2.3522);

    for level in [0, 4, MAX_LEVEL] {
        group.bench_with_input(
            BenchmarkId::new("from_coordinates", level),
            &level,
            |b, &level| b.iter(|| TileIndex::from_coordinates(black_box(&coordinate), level)),
        );
    }

    let index = TileIndex::from_coordinates(&coordinate, MAX_LEVEL);
    group.bench_function("to_coordinates", |b| {
        b.iter(|| black_box(&index).to_coordinates())
    });

    group.finish();
}

fn benchmark_tiler(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiler");
    let coordinates = scattered_coordinates(1000);

    group.bench_function("insert_1000", |b| {
        b.iter(|| {
            let mut tiler = ItemMarkerTiler::new();
            for (i, c) in coordinates.iter().enumerate() {
                tiler.insert_marker(MarkerId(i as u64), *c).unwrap();
            }
            tiler
        })
    });

    group.bench_function("regenerate_10000", |b| {
        let mut tiler = populated_tiler(10_000);
        b.iter(|| {
            tiler.regenerate_tiles();
            black_box(tiler.marker_count(&TileIndex::new()))
        })
    });

    let mut tiler = populated_tiler(10_000);
    for level in [2, 5] {
        group.bench_with_input(
            BenchmarkId::new("iterate_whole_world", level),
            &level,
            |b, &level| b.iter(|| NonEmptyIterator::new(&mut tiler, level).count()),
        );
    }

    group.finish();
}

fn benchmark_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(20);

    for count in [1_000, 10_000] {
        let mut builder = ClusterBuilder::with_tiler(Config::default(), populated_tiler(count));
        let mut backend =
            EquirectangularBackend::new(GeoBounds::WORLD, ScreenSize::new(1600, 800), 4);

        group.bench_with_input(BenchmarkId::new("update_clusters", count), &count, |b, _| {
            b.iter(|| {
                builder.set_clusters_dirty();
                builder.update_clusters(&mut backend);
                black_box(builder.clusters().len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_tile_index,
    benchmark_tiler,
    benchmark_clustering
);
criterion_main!(benches);
