//! Integration tests for the schemalign library

use schemalign::prelude::*;
use schemalign::{
    find_isolated_box_sides, get_box_side_subgraph, partition_graph, synthesize_graph_edits, AdaptationMode, BoxId,
    PartitionOptions, PinKey, Point, Side, SimilarityMetric,
};
use schemalign::partition::IsolationOptions;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn corpus() -> Corpus {
    Corpus::from_dir(&fixture_path("corpus")).expect("fixture corpus should load")
}

fn load(name: &str) -> BpcGraph {
    BpcGraph::load(&fixture_path(name)).expect("fixture graph should load")
}

fn center_of(graph: &BpcGraph, id: &str) -> Option<Point> {
    graph.get_box(&BoxId::from(id)).and_then(|b| b.center())
}

#[test]
fn test_corpus_names_follow_directory_layout() {
    let corpus = corpus();
    let names: Vec<&str> = corpus.names().collect();
    assert_eq!(names, vec!["divider", "power/ldo"]);
}

#[test]
fn test_ranking_prefers_isomorphic_template() {
    let corpus = corpus();
    let ldo = load("ldo_floating.json");
    let ranked = corpus.rank(&ldo, 3, SimilarityMetric::Jaccard).unwrap();
    assert_eq!(ranked[0].name, "power/ldo");
    assert_eq!(ranked[0].distance, 0.0);
    assert!(ranked[1].distance > 0.0);

    let divider = load("divider_floating.json");
    let ranked = corpus.rank(&divider, 2, SimilarityMetric::Cosine).unwrap();
    assert_eq!(ranked[0].name, "divider");
}

#[test]
fn test_divider_layout_without_partitions() {
    // No box has three real pins, so the whole graph is one piece.
    let result = LayoutCore::layout_files(
        &fixture_path("divider_floating.json"),
        &fixture_path("corpus"),
        &LayoutOptions::default(),
    )
    .unwrap();

    assert_eq!(result.reports.len(), 1);
    assert_eq!(result.reports[0].partition, None);
    assert_eq!(result.reports[0].template.as_deref(), Some("divider"));
    assert_eq!(center_of(&result.graph, "R1"), Some(Point::new(0.0, -3.0)));
    assert_eq!(center_of(&result.graph, "R2"), Some(Point::new(0.0, 3.0)));
    assert_eq!(result.stats.floating_boxes, 0);

    // Networks keep their floating names.
    let pin = result.graph.get_pin(&PinKey::new("R1", "1")).unwrap();
    assert_eq!(pin.network_id.as_str(), "VCC_IN");
}

#[test]
fn test_ldo_whole_graph_layout() {
    let options = LayoutOptions {
        use_partitioning: false,
        ..LayoutOptions::default()
    };
    let result = LayoutCore::layout_by_analogy(&load("ldo_floating.json"), &corpus(), &options).unwrap();

    assert_eq!(result.reports[0].template.as_deref(), Some("power/ldo"));
    assert_eq!(result.reports[0].boxes_matched, 3);
    assert_eq!(center_of(&result.graph, "U1"), Some(Point::new(0.0, 0.0)));
    assert_eq!(center_of(&result.graph, "C1"), Some(Point::new(-6.0, 2.0)));
    assert_eq!(center_of(&result.graph, "C2"), Some(Point::new(6.0, 2.0)));
    assert_eq!(result.graph.pins.len(), 9);
    assert!(result.graph.validate().is_ok());
}

#[test]
fn test_ldo_partitioned_layout() {
    let result = LayoutCore::layout_by_analogy(&load("ldo_floating.json"), &corpus(), &LayoutOptions::default()).unwrap();

    let labels: Vec<&str> = result.reports.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["U1#left", "U1#right", "U1#bottom"]);
    // Every template puts the right-hand piece's U1 pin on a top or bottom
    // edge, so that piece stays unmatched instead of turning U1 around.
    assert!(!result.reports[1].is_matched());
    assert_eq!(result.matched_pieces(), 2);
    assert_eq!(result.stats.box_count, 3);
    assert_eq!(result.stats.floating_boxes, 0);

    let vout = result.graph.get_pin(&PinKey::new("U1", "VOUT")).unwrap();
    assert_eq!(vout.offset, Point::new(3.0, 0.0));
    let vin = result.graph.get_pin(&PinKey::new("U1", "VIN")).unwrap();
    assert_eq!(vin.offset, Point::new(-3.0, -1.0));
    let u1 = center_of(&result.graph, "U1").unwrap();
    let c1 = center_of(&result.graph, "C1").unwrap();
    let c2 = center_of(&result.graph, "C2").unwrap();
    assert!(c1.x < u1.x);
    assert!(c2.x > u1.x);
    // Every floating pin survives the merge.
    assert_eq!(result.graph.pins.len(), 9);
    assert!(result.graph.validate().is_ok());
}

#[test]
fn test_inherit_mode_preserves_floating_pins() {
    let floating = load("ldo_floating.json");
    let options = LayoutOptions {
        use_partitioning: false,
        mode: AdaptationMode::Inherit,
        ..LayoutOptions::default()
    };
    let result = LayoutCore::layout_by_analogy(&floating, &corpus(), &options).unwrap();
    let ids: Vec<PinKey> = result.graph.pins.iter().map(|p| p.key()).collect();
    let expected: Vec<PinKey> = floating.pins.iter().map(|p| p.key()).collect();
    assert_eq!(ids, expected);
    assert_eq!(center_of(&result.graph, "C2"), Some(Point::new(6.0, 2.0)));
}

#[test]
fn test_ldo_partitions() {
    let partitions = partition_graph(&load("ldo_floating.json"), &PartitionOptions::default()).unwrap();
    assert_eq!(partitions.len(), 3);
    assert_eq!(partitions[0].side, Side::Left);
    assert!(partitions[0].pins.contains(&PinKey::new("U1", "VIN")));
    assert!(partitions[0].pins.contains(&PinKey::new("U1", "EN")));
    assert!(partitions[0].pins.contains(&PinKey::new("C1", "1")));
    assert!(partitions[1].pins.contains(&PinKey::new("C2", "1")));
    assert!(partitions[2].pins.contains(&PinKey::new("U1", "GND")));

    // Centre markers travel with their box.
    for partition in &partitions {
        assert!(partition.graph.get_pin(&PinKey::new("U1", "c")).is_some());
    }
}

#[test]
fn test_ldo_sides_join_through_ground() {
    let graph = load("ldo_floating.json");
    // Both capacitors bridge their signal to the ground rail on U1's bottom.
    let clusters = find_isolated_box_sides(&graph, &BoxId::from("U1"), &IsolationOptions::default()).unwrap();
    assert_eq!(clusters, vec![vec![Side::Left, Side::Right, Side::Bottom]]);

    let shared = IsolationOptions::default().with_power_rails_shared();
    let clusters = find_isolated_box_sides(&graph, &BoxId::from("U1"), &shared).unwrap();
    assert_eq!(clusters, vec![vec![Side::Left], vec![Side::Right], vec![Side::Bottom]]);

    let left = get_box_side_subgraph(&graph, &BoxId::from("U1"), Some(Side::Left)).unwrap();
    assert!(left.pins.iter().any(|p| p.pin_id.as_str() == "VIN"));
    assert!(left.pins.iter().all(|p| p.pin_id.as_str() != "VOUT"));
    assert!(matches!(
        get_box_side_subgraph(&graph, &BoxId::from("U1"), Some(Side::Top)),
        Err(SchemalignError::SideNotFound { .. })
    ));
}

#[test]
fn test_isomorphic_template_needs_no_edits() {
    let floating = load("divider_floating.json");
    let corpus = corpus();
    let template = corpus.get("divider").unwrap();
    let assignment = schemalign::assign(StrategyKind::Histogram, &Default::default(), &floating, template).unwrap();
    let script = synthesize_graph_edits(&floating, template, &assignment).unwrap();
    assert!(script.operations.is_empty());
}

#[test]
fn test_every_strategy_handles_the_divider() {
    let floating = load("divider_floating.json");
    let corpus = corpus();
    let template = corpus.get("divider").unwrap();
    for kind in [StrategyKind::Histogram, StrategyKind::WlBucket, StrategyKind::Exhaustive] {
        let assignment = schemalign::assign(kind, &Default::default(), &floating, template).unwrap();
        assert_eq!(assignment.boxes.get(&BoxId::from("R1")), Some(&BoxId::from("RA")), "{}", kind);
        assert_eq!(assignment.boxes.get(&BoxId::from("R2")), Some(&BoxId::from("RB")), "{}", kind);
        assert!(assignment.validate(&floating, template).is_ok());
    }
}

#[test]
fn test_invalid_input_is_rejected() {
    let result = LayoutCore::layout_files(
        &fixture_path("invalid_missing_box.json"),
        &fixture_path("corpus"),
        &LayoutOptions::default(),
    );
    assert!(matches!(result, Err(SchemalignError::MissingBox { .. })));
}

#[test]
fn test_nonexistent_file() {
    let result = LayoutCore::layout_files(
        &fixture_path("does_not_exist.json"),
        &fixture_path("corpus"),
        &LayoutOptions::default(),
    );
    assert!(matches!(result, Err(SchemalignError::Io(_))));
}
