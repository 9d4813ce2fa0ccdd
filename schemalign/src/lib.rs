//! Schemalign - schematic layout by analogy
//!
//! This library matches a "floating" circuit graph (components and their
//! connectivity, without a layout) against a corpus of laid-out templates
//! and rewrites it so it inherits the closest template's placement.
//!
//! # Quick Start
//!
//! ```no_run
//! use schemalign::{BpcGraph, Corpus, LayoutCore, LayoutOptions};
//! use std::path::Path;
//!
//! let floating = BpcGraph::load(Path::new("circuit.json")).unwrap();
//! let corpus = Corpus::from_dir(Path::new("corpus/")).unwrap();
//! let result = LayoutCore::layout_by_analogy(&floating, &corpus, &LayoutOptions::default()).unwrap();
//!
//! for report in &result.reports {
//!     println!("{}: {:?}", report.label, report.template);
//! }
//! ```
//!
//! # Features
//!
//! - **WL similarity**: Weisfeiler–Lehman colour refinement over the flattened box/pin graph
//! - **Partitioning**: per-side partitions spread along networks with singleton roles
//! - **Assignment**: histogram/greedy, WL-bucket and capped exhaustive strategies
//! - **Adaptation**: edit-operation synthesis, net adaptation and layout inheritance

pub mod adapt;
pub mod assignment;
pub mod core;
pub mod corpus;
pub mod edit;
pub mod graph;
pub mod merge;
pub mod partition;
pub mod renetwork;
pub mod wl;

// Re-export main types
pub use adapt::{inherit_layout, net_adapt_graph, AdaptOptions, AdaptResult, InheritOptions};
pub use assignment::{assign, Assignment, AssignmentOptions, AssignmentStrategy, StrategyKind};
pub use core::{
    AdaptationMode, LayoutCore, LayoutOptions, LayoutResult, PartitionReport, Result, SchemalignError, TemplateMatch,
};
pub use corpus::{discover_graph_files, Corpus, RankedTemplate};
pub use edit::{apply_operation, replay, synthesize_edits, synthesize_graph_edits, EditOperation, EditScript};
pub use graph::{BoxId, BpcBox, BpcGraph, BpcPin, Color, NetworkId, NodeKey, PinId, PinKey, Placement, Point};
pub use merge::merge_partitions;
pub use partition::{
    find_isolated_box_sides, get_box_side_subgraph, partition_graph, Partition, PartitionOptions,
    SchematicPartitionProcessor, Side,
};
pub use renetwork::{renetwork, ConnectivityPredicate, RenetworkResult, SameSidePredicate};
pub use wl::{graph_features, wl_distance, SimilarityMetric, WlFeatures};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Assignment, BpcBox, BpcGraph, BpcPin, Corpus, LayoutCore, LayoutOptions, LayoutResult, SchemalignError,
        StrategyKind,
    };
}
