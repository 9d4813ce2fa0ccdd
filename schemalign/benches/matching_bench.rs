use criterion::{black_box, criterion_group, criterion_main, Criterion};
use schemalign::prelude::*;
use schemalign::{graph_features, partition_graph, PartitionOptions};
use schemalign::graph::Labeling;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> BpcGraph {
    BpcGraph::load(&fixture_path(name)).expect("fixture graph")
}

fn bench_wl_features(c: &mut Criterion) {
    let graph = load("ldo_floating.json");
    c.bench_function("wl_features", |b| {
        b.iter(|| graph_features(black_box(&graph), &Labeling::Colors, 3));
    });
}

fn bench_partition(c: &mut Criterion) {
    let graph = load("ldo_floating.json");
    let options = PartitionOptions::default();
    c.bench_function("partition_graph", |b| {
        b.iter(|| partition_graph(black_box(&graph), black_box(&options)));
    });
}

fn bench_layout_by_analogy(c: &mut Criterion) {
    let graph = load("ldo_floating.json");
    let corpus = Corpus::from_dir(&fixture_path("corpus")).expect("fixture corpus");
    let options = LayoutOptions::default();
    c.bench_function("layout_by_analogy", |b| {
        b.iter(|| LayoutCore::layout_by_analogy(black_box(&graph), black_box(&corpus), black_box(&options)));
    });
}

criterion_group!(benches, bench_wl_features, bench_partition, bench_layout_by_analogy);
criterion_main!(benches);
