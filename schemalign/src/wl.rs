//! Weisfeiler–Lehman colour refinement and histogram similarity
//!
//! Round 0 colours come from caller-provided labels (or a placeholder).
//! Each further round recolours a node with its own colour followed by the
//! sorted multiset of its neighbours' colours; the self-loop on the
//! diagonal means a node's own colour is always part of that multiset.
//! Signatures are digested with `FxHasher` so colours stay short however
//! many rounds are run, while equal signatures always give equal colours
//! across graphs.
//!
//! The per-round colour histograms form the WL feature vector compared by
//! [`wl_distance`] (weighted Jaccard) or [`cosine_distance`].

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::core::{Result, SchemalignError};
use crate::graph::{AdjacencyMatrix, BpcGraph, FlattenedGraph, Labeling};

/// Colour given to nodes without a label
pub const PLACEHOLDER_COLOR: &str = "*";

/// Colour string → number of nodes carrying it
pub type ColorHistogram = BTreeMap<String, usize>;

/// One histogram per round, rounds `0..=K`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WlFeatures {
    pub rounds: Vec<ColorHistogram>,
}

impl WlFeatures {
    /// Number of histograms (`K + 1`)
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

/// Per-node colours for every round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WlColoring {
    rounds: Vec<Vec<String>>,
}

impl WlColoring {
    /// Number of refinement rounds run (`K`)
    pub fn refinement_rounds(&self) -> usize {
        self.rounds.len().saturating_sub(1)
    }

    /// Colors after round `i`; `None` past the last round.
    pub fn round(&self, i: usize) -> Option<&[String]> {
        self.rounds.get(i).map(Vec::as_slice)
    }

    pub fn final_colors(&self) -> &[String] {
        self.rounds.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn features(&self) -> WlFeatures {
        WlFeatures {
            rounds: self.rounds.iter().map(|colors| histogram(colors)).collect(),
        }
    }
}

fn histogram(colors: &[String]) -> ColorHistogram {
    let mut h = ColorHistogram::new();
    for c in colors {
        *h.entry(c.clone()).or_insert(0) += 1;
    }
    h
}

fn digest(signature: &str) -> String {
    let mut hasher = FxHasher::default();
    signature.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Run `rounds` refinement rounds over a matrix.
///
/// `labels` is either empty (all placeholders) or one entry per node.
pub fn refine_colors(
    matrix: &AdjacencyMatrix,
    labels: &[Option<String>],
    rounds: usize,
) -> Result<WlColoring> {
    let n = matrix.len();
    if !labels.is_empty() && labels.len() != n {
        return Err(SchemalignError::LabelCountMismatch {
            nodes: n,
            labels: labels.len(),
        });
    }

    let initial: Vec<String> = (0..n)
        .map(|i| {
            labels
                .get(i)
                .and_then(|l| l.clone())
                .unwrap_or_else(|| PLACEHOLDER_COLOR.to_string())
        })
        .collect();

    let mut history = Vec::with_capacity(rounds + 1);
    history.push(initial);

    for _ in 0..rounds {
        let current = &history[history.len() - 1];
        let next: Vec<String> = (0..n)
            .map(|v| {
                let mut neighbors: Vec<&str> =
                    matrix.neighbors(v).map(|u| current[u].as_str()).collect();
                neighbors.sort_unstable();
                digest(&format!("{}|{}", current[v], neighbors.join(",")))
            })
            .collect();
        history.push(next);
    }

    Ok(WlColoring { rounds: history })
}

/// Refinement over raw rows; a non-square input is rejected before any work.
pub fn refine_rows(rows: Vec<Vec<u8>>, labels: &[Option<String>], rounds: usize) -> Result<WlColoring> {
    let matrix = AdjacencyMatrix::from_rows(rows)?;
    refine_colors(&matrix, labels, rounds)
}

/// Flatten a graph and refine it, keeping the flattened view for node lookups.
pub fn graph_coloring(
    graph: &BpcGraph,
    labeling: &Labeling,
    rounds: usize,
) -> Result<(FlattenedGraph, WlColoring)> {
    let flat = FlattenedGraph::from_graph(graph)?;
    let coloring = refine_colors(&flat.adjacency(), &flat.labels(labeling), rounds)?;
    Ok((flat, coloring))
}

pub fn graph_features(graph: &BpcGraph, labeling: &Labeling, rounds: usize) -> Result<WlFeatures> {
    Ok(graph_coloring(graph, labeling, rounds)?.1.features())
}

/// Weighted Jaccard: Σ min / Σ max over the union of keys.
///
/// Two empty histograms are identical (1.0).
pub fn weighted_jaccard<K: Ord>(a: &BTreeMap<K, usize>, b: &BTreeMap<K, usize>) -> f64 {
    let mut min_sum = 0usize;
    let mut max_sum = 0usize;
    for (key, &ca) in a {
        let cb = b.get(key).copied().unwrap_or(0);
        min_sum += ca.min(cb);
        max_sum += ca.max(cb);
    }
    for (key, &cb) in b {
        if !a.contains_key(key) {
            max_sum += cb;
        }
    }
    if max_sum == 0 {
        1.0
    } else {
        min_sum as f64 / max_sum as f64
    }
}

/// Cosine similarity of two count vectors, clamped to `[0, 1]`.
pub fn cosine_similarity<K: Ord>(a: &BTreeMap<K, usize>, b: &BTreeMap<K, usize>) -> f64 {
    let norm_a: f64 = a.values().map(|&c| (c * c) as f64).sum();
    let norm_b: f64 = b.values().map(|&c| (c * c) as f64).sum();
    if norm_a == 0.0 && norm_b == 0.0 {
        return 1.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(key, &ca)| b.get(key).map(|&cb| (ca * cb) as f64))
        .sum();
    (dot / (norm_a * norm_b).sqrt()).clamp(0.0, 1.0)
}

fn per_round<F>(a: &WlFeatures, b: &WlFeatures, similarity: F) -> Vec<f64>
where
    F: Fn(&ColorHistogram, &ColorHistogram) -> f64,
{
    let empty = ColorHistogram::new();
    (0..a.len().max(b.len()))
        .map(|i| {
            similarity(
                a.rounds.get(i).unwrap_or(&empty),
                b.rounds.get(i).unwrap_or(&empty),
            )
        })
        .collect()
}

/// Weighted-Jaccard similarity per round
pub fn per_round_jaccard(a: &WlFeatures, b: &WlFeatures) -> Vec<f64> {
    per_round(a, b, weighted_jaccard)
}

/// Cosine similarity per round
pub fn per_round_cosine(a: &WlFeatures, b: &WlFeatures) -> Vec<f64> {
    per_round(a, b, cosine_similarity)
}

/// Mean per-round weighted-Jaccard similarity in `[0, 1]`
pub fn wl_similarity(a: &WlFeatures, b: &WlFeatures) -> f64 {
    let sims = per_round_jaccard(a, b);
    if sims.is_empty() {
        1.0
    } else {
        sims.iter().sum::<f64>() / sims.len() as f64
    }
}

/// `(K + 1) − Σ per-round similarity`; exactly 0 for identical features.
pub fn wl_distance(a: &WlFeatures, b: &WlFeatures) -> f64 {
    let sims = per_round_jaccard(a, b);
    sims.len() as f64 - sims.iter().sum::<f64>()
}

/// Cosine counterpart of [`wl_distance`]
pub fn cosine_distance(a: &WlFeatures, b: &WlFeatures) -> f64 {
    let sims = per_round_cosine(a, b);
    sims.len() as f64 - sims.iter().sum::<f64>()
}

/// Histogram comparison used when ranking templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Jaccard,
    Cosine,
}

impl SimilarityMetric {
    pub fn distance(self, a: &WlFeatures, b: &WlFeatures) -> f64 {
        match self {
            SimilarityMetric::Jaccard => wl_distance(a, b),
            SimilarityMetric::Cosine => cosine_distance(a, b),
        }
    }
}
