//! Canonical-coloring (WL bucket) assignment
//!
//! Both graphs are refined from structural labels only, so boxes with the
//! same final color are interchangeable. Every floating bucket must meet an
//! equally sized template bucket; inside a bucket, pairing is positional.

use std::collections::{BTreeMap, BTreeSet};

use super::{Assignment, AssignmentStrategy};
use crate::core::{Result, SchemalignError};
use crate::graph::{BoxId, BpcGraph, Color, FlattenedGraph, Labeling, NodeKey, PinKey, CENTER_COLOR};
use crate::wl::{graph_coloring, WlColoring};

#[derive(Debug, Clone)]
pub struct WlBucketOptions {
    /// Pin colors kept as initial labels; every other pin starts as `pin`.
    pub structural_colors: BTreeSet<Color>,
    /// Refinement rounds; defaults to the floating graph's box count.
    pub rounds: Option<usize>,
}

impl Default for WlBucketOptions {
    fn default() -> Self {
        Self {
            structural_colors: [Color::from(CENTER_COLOR)].into_iter().collect(),
            rounds: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WlBucketStrategy {
    options: WlBucketOptions,
}

impl WlBucketStrategy {
    pub fn new(options: WlBucketOptions) -> Self {
        Self { options }
    }
}

struct Colored<'g> {
    graph: &'g BpcGraph,
    flat: FlattenedGraph,
    coloring: WlColoring,
}

impl<'g> Colored<'g> {
    fn new(graph: &'g BpcGraph, labeling: &Labeling, rounds: usize) -> Result<Self> {
        let (flat, coloring) = graph_coloring(graph, labeling, rounds)?;
        Ok(Self { graph, flat, coloring })
    }

    fn color_of(&self, key: &NodeKey) -> Option<&str> {
        let idx = self.flat.index_of(key)?;
        self.coloring.final_colors().get(idx).map(String::as_str)
    }

    /// Final color → boxes, each bucket in graph order
    fn box_buckets(&self) -> BTreeMap<String, Vec<BoxId>> {
        let mut buckets: BTreeMap<String, Vec<BoxId>> = BTreeMap::new();
        for bx in &self.graph.boxes {
            if let Some(color) = self.color_of(&NodeKey::for_box(&bx.box_id)) {
                buckets.entry(color.to_string()).or_default().push(bx.box_id.clone());
            }
        }
        buckets
    }

    fn pin_buckets(&self, box_id: &BoxId) -> BTreeMap<String, Vec<PinKey>> {
        let mut buckets: BTreeMap<String, Vec<PinKey>> = BTreeMap::new();
        for pin in self.graph.pins_of_box(box_id) {
            let key = pin.key();
            if let Some(color) = self.color_of(&NodeKey::for_pin(&key)) {
                buckets.entry(color.to_string()).or_default().push(key);
            }
        }
        buckets
    }
}

impl AssignmentStrategy for WlBucketStrategy {
    fn name(&self) -> &'static str {
        "wl_bucket"
    }

    fn assign(&self, floating: &BpcGraph, fixed: &BpcGraph) -> Result<Assignment> {
        let rounds = self.options.rounds.unwrap_or(floating.boxes.len());
        let labeling = Labeling::Structural(self.options.structural_colors.clone());

        let left = Colored::new(floating, &labeling, rounds)?;
        let right = Colored::new(fixed, &labeling, rounds)?;

        let right_buckets = right.box_buckets();
        let mut assignment = Assignment::new();
        for (color, boxes) in left.box_buckets() {
            let template = right_buckets.get(&color).map(Vec::as_slice).unwrap_or(&[]);
            if template.len() != boxes.len() {
                return Err(SchemalignError::BucketSizeMismatch {
                    color,
                    floating: boxes.len(),
                    fixed: template.len(),
                });
            }
            for (from, to) in boxes.into_iter().zip(template) {
                assignment.boxes.insert(from, to.clone());
            }
        }

        for (from, to) in &assignment.boxes {
            let template_pins = right.pin_buckets(to);
            for (color, pins) in left.pin_buckets(from) {
                if let Some(targets) = template_pins.get(&color) {
                    for (l, r) in pins.into_iter().zip(targets) {
                        assignment.pins.insert(l, r.clone());
                    }
                }
            }
        }
        assignment.derive_networks_from_pins(floating, fixed);
        Ok(assignment)
    }
}
