//! Exhaustive assignment search
//!
//! [`AssignmentCandidates`] lazily enumerates every injective partial map
//! from `left` items to `right` items ("all permutations with skips").
//! The sequence is exponential in the smaller side, so callers cap it with
//! `Iterator::take`; [`ExhaustiveStrategy`] does so via `max_candidates`.

use std::collections::BTreeMap;

use super::histogram::{box_histograms, Histogram, HistogramOptions};
use super::{Assignment, AssignmentStrategy};
use crate::core::Result;
use crate::graph::{BoxId, BpcGraph};
use crate::wl::weighted_jaccard;

/// Lazy iterator over injective partial maps.
///
/// Each item holds one choice per left item: `Some(j)` pairs it with right
/// item `j`, `None` skips it. Items come in lexicographic order with
/// `None` ranked after every right index, so the first item pairs greedily
/// by index and the last one skips everything.
#[derive(Debug, Clone)]
pub struct AssignmentCandidates {
    right: usize,
    current: Vec<Option<usize>>,
    used: Vec<bool>,
    started: bool,
    exhausted: bool,
}

impl AssignmentCandidates {
    pub fn new(left: usize, right: usize) -> Self {
        Self {
            right,
            current: vec![None; left],
            used: vec![false; right],
            started: false,
            exhausted: false,
        }
    }

    fn rank(&self, choice: Option<usize>) -> usize {
        choice.unwrap_or(self.right)
    }

    /// Lowest free rank `>= from`; rank `right` (skip) is always free.
    fn next_free(&self, from: usize) -> Option<usize> {
        (from..=self.right).find(|&r| r == self.right || !self.used[r])
    }

    fn set(&mut self, i: usize, rank: usize) {
        if rank < self.right {
            self.used[rank] = true;
            self.current[i] = Some(rank);
        } else {
            self.current[i] = None;
        }
    }

    fn fill_from(&mut self, start: usize) {
        for i in start..self.current.len() {
            let rank = self.next_free(0).unwrap_or(self.right);
            self.set(i, rank);
        }
    }

    fn advance(&mut self) -> bool {
        let mut i = self.current.len();
        while i > 0 {
            i -= 1;
            let rank = self.rank(self.current[i]);
            if let Some(j) = self.current[i] {
                self.used[j] = false;
            }
            if let Some(next) = self.next_free(rank + 1) {
                self.set(i, next);
                self.fill_from(i + 1);
                return true;
            }
            self.current[i] = None;
        }
        false
    }
}

impl Iterator for AssignmentCandidates {
    type Item = Vec<Option<usize>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            self.fill_from(0);
        } else if !self.advance() {
            self.exhausted = true;
            return None;
        }
        Some(self.current.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ExhaustiveOptions {
    /// Upper bound on candidates scored per call
    pub max_candidates: usize,
    pub histogram: HistogramOptions,
}

impl Default for ExhaustiveOptions {
    fn default() -> Self {
        Self {
            max_candidates: 5000,
            histogram: HistogramOptions::default(),
        }
    }
}

/// Scores box candidates by summed histogram similarity and keeps the
/// first best one. Pins pair by color inside matched boxes; networks then
/// follow the pins.
#[derive(Debug, Clone, Default)]
pub struct ExhaustiveStrategy {
    options: ExhaustiveOptions,
}

impl ExhaustiveStrategy {
    pub fn new(options: ExhaustiveOptions) -> Self {
        Self { options }
    }
}

fn score(candidate: &[Option<usize>], left: &[(&BoxId, &Histogram)], right: &[(&BoxId, &Histogram)]) -> f64 {
    candidate
        .iter()
        .zip(left)
        .filter_map(|(choice, (_, lh))| choice.map(|j| weighted_jaccard(*lh, right[j].1)))
        .sum()
}

impl AssignmentStrategy for ExhaustiveStrategy {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn assign(&self, floating: &BpcGraph, fixed: &BpcGraph) -> Result<Assignment> {
        let ignored = &self.options.histogram.ignored_colors;
        let left_h = box_histograms(floating, ignored);
        let right_h = box_histograms(fixed, ignored);
        let left: Vec<(&BoxId, &Histogram)> = left_h.iter().collect();
        let right: Vec<(&BoxId, &Histogram)> = right_h.iter().collect();

        let mut best: Option<(f64, Vec<Option<usize>>)> = None;
        let mut scored = 0usize;
        for candidate in AssignmentCandidates::new(left.len(), right.len()).take(self.options.max_candidates) {
            scored += 1;
            let s = score(&candidate, &left, &right);
            if best.as_ref().map_or(true, |(b, _)| s > *b) {
                best = Some((s, candidate));
            }
        }
        tracing::debug!("Exhaustive search scored {} candidate(s)", scored);

        let mut assignment = Assignment::new();
        if let Some((_, choice)) = best {
            assignment.boxes = choice
                .iter()
                .zip(&left)
                .filter_map(|(c, (from, _))| c.map(|j| ((*from).clone(), right[j].0.clone())))
                .collect::<BTreeMap<_, _>>();
        }
        assignment.derive_pins(floating, fixed);
        assignment.derive_networks_from_pins(floating, fixed);
        assignment.derive_pins(floating, fixed);
        Ok(assignment)
    }
}
