//! Histogram / greedy assignment
//!
//! Boxes and networks are described by the color histogram of their pins.
//! Items whose canonical histogram key is unique on both sides pair up
//! directly; the rest are matched greedily by weighted-Jaccard similarity.
//! The greedy pass never backtracks.

use std::collections::{BTreeMap, BTreeSet};

use super::{Assignment, AssignmentStrategy};
use crate::core::Result;
use crate::graph::{BoxId, BpcGraph, Color, NetworkId, CENTER_COLOR};
use crate::wl::weighted_jaccard;

/// Color → pin count
pub type Histogram = BTreeMap<Color, usize>;

/// `color:count|color:count...` in color order
pub fn canonical_key(histogram: &Histogram) -> String {
    histogram
        .iter()
        .map(|(color, count)| format!("{}:{}", color, count))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn box_histograms(graph: &BpcGraph, ignored: &BTreeSet<Color>) -> BTreeMap<BoxId, Histogram> {
    let mut histograms: BTreeMap<BoxId, Histogram> =
        graph.boxes.iter().map(|b| (b.box_id.clone(), Histogram::new())).collect();
    for pin in graph.pins.iter().filter(|p| !ignored.contains(&p.color)) {
        if let Some(h) = histograms.get_mut(&pin.box_id) {
            *h.entry(pin.color.clone()).or_insert(0) += 1;
        }
    }
    histograms
}

pub fn network_histograms(graph: &BpcGraph, ignored: &BTreeSet<Color>) -> BTreeMap<NetworkId, Histogram> {
    let mut histograms: BTreeMap<NetworkId, Histogram> = BTreeMap::new();
    for pin in graph.pins.iter().filter(|p| !ignored.contains(&p.color)) {
        *histograms
            .entry(pin.network_id.clone())
            .or_default()
            .entry(pin.color.clone())
            .or_insert(0) += 1;
    }
    histograms
}

/// Exact unique-bucket pairing followed by the greedy pass.
///
/// Both sides are scanned in key order, so the first best-scoring right
/// item wins ties. Every left item is paired while the right pool lasts,
/// even at similarity 0.
pub fn match_histograms<K: Ord + Clone>(left: &BTreeMap<K, Histogram>, right: &BTreeMap<K, Histogram>) -> BTreeMap<K, K> {
    let bucket = |items: &BTreeMap<K, Histogram>| {
        let mut buckets: BTreeMap<String, Vec<K>> = BTreeMap::new();
        for (key, h) in items {
            buckets.entry(canonical_key(h)).or_default().push(key.clone());
        }
        buckets
    };
    let left_buckets = bucket(left);
    let right_buckets = bucket(right);

    let mut pairs = BTreeMap::new();
    let mut used = BTreeSet::new();
    for (key, l) in &left_buckets {
        if let Some(r) = right_buckets.get(key) {
            if l.len() == 1 && r.len() == 1 {
                pairs.insert(l[0].clone(), r[0].clone());
                used.insert(r[0].clone());
            }
        }
    }
    let exact = pairs.len();

    let mut pool: Vec<&K> = right.keys().filter(|k| !used.contains(*k)).collect();
    for (key, h) in left {
        if pairs.contains_key(key) {
            continue;
        }
        if pool.is_empty() {
            break;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in pool.iter().enumerate() {
            let score = right.get(*candidate).map_or(0.0, |rh| weighted_jaccard(h, rh));
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
            if score >= 1.0 {
                break;
            }
        }
        if let Some((i, _)) = best {
            let chosen = pool.remove(i);
            pairs.insert(key.clone(), chosen.clone());
        }
    }

    tracing::trace!("Histogram match: {} exact, {} greedy", exact, pairs.len() - exact);
    pairs
}

#[derive(Debug, Clone)]
pub struct HistogramOptions {
    /// Colors left out of every histogram
    pub ignored_colors: BTreeSet<Color>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            ignored_colors: [Color::from(CENTER_COLOR)].into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistogramStrategy {
    options: HistogramOptions,
}

impl HistogramStrategy {
    pub fn new(options: HistogramOptions) -> Self {
        Self { options }
    }
}

impl AssignmentStrategy for HistogramStrategy {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn assign(&self, floating: &BpcGraph, fixed: &BpcGraph) -> Result<Assignment> {
        let ignored = &self.options.ignored_colors;
        let mut assignment = Assignment {
            boxes: match_histograms(&box_histograms(floating, ignored), &box_histograms(fixed, ignored)),
            networks: match_histograms(&network_histograms(floating, ignored), &network_histograms(fixed, ignored)),
            pins: BTreeMap::new(),
        };
        assignment.derive_pins(floating, fixed);
        Ok(assignment)
    }
}
