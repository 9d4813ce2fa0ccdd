//! Correspondence between a floating graph and a template graph
//!
//! Every strategy produces an [`Assignment`]: box → box and network →
//! network maps keyed by floating-side ids, plus the pin → pin map that
//! follows from them. Strategies never mutate their inputs.

pub mod exhaustive;
pub mod histogram;
pub mod wl_bucket;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::{Result, SchemalignError};
use crate::graph::{BoxId, BpcGraph, BpcPin, NetworkId, NodeKey, PinKey};

pub use exhaustive::{AssignmentCandidates, ExhaustiveOptions, ExhaustiveStrategy};
pub use histogram::{HistogramOptions, HistogramStrategy};
pub use wl_bucket::{WlBucketOptions, WlBucketStrategy};

/// Floating-id → template-id correspondence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub boxes: BTreeMap<BoxId, BoxId>,
    pub networks: BTreeMap<NetworkId, NetworkId>,
    #[serde(with = "pin_pairs")]
    pub pins: BTreeMap<PinKey, PinKey>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.networks.is_empty() && self.pins.is_empty()
    }

    /// Template box → floating box
    pub fn inverse_boxes(&self) -> BTreeMap<BoxId, BoxId> {
        self.boxes.iter().map(|(f, t)| (t.clone(), f.clone())).collect()
    }

    pub fn inverse_networks(&self) -> BTreeMap<NetworkId, NetworkId> {
        self.networks.iter().map(|(f, t)| (t.clone(), f.clone())).collect()
    }

    pub fn inverse_pins(&self) -> BTreeMap<PinKey, PinKey> {
        self.pins.iter().map(|(f, t)| (t.clone(), f.clone())).collect()
    }

    /// Node-level view over the flattened graphs: boxes and pins.
    pub fn node_assignment(&self) -> BTreeMap<NodeKey, NodeKey> {
        self.boxes
            .iter()
            .map(|(f, t)| (NodeKey::for_box(f), NodeKey::for_box(t)))
            .chain(self.pins.iter().map(|(f, t)| (NodeKey::for_pin(f), NodeKey::for_pin(t))))
            .collect()
    }

    /// Pair the pins of every matched box pair.
    ///
    /// Three passes, each in pin order: same mapped network and color,
    /// then same mapped network, then same color. Pins left over after
    /// the last pass stay unmatched.
    pub fn derive_pins(&mut self, floating: &BpcGraph, fixed: &BpcGraph) {
        let networks = &self.networks;
        let mut pins = BTreeMap::new();

        for (from, to) in &self.boxes {
            let left: Vec<&BpcPin> = floating.pins_of_box(from).collect();
            let right: Vec<&BpcPin> = fixed.pins_of_box(to).collect();
            let mut taken = vec![false; right.len()];
            let mut matched = vec![false; left.len()];

            for pass in 0..3 {
                for (i, l) in left.iter().enumerate() {
                    if matched[i] {
                        continue;
                    }
                    let same_net = |r: &BpcPin| networks.get(&l.network_id) == Some(&r.network_id);
                    let found = right.iter().enumerate().find(|(j, r)| {
                        !taken[*j]
                            && match pass {
                                0 => same_net(r) && l.color == r.color,
                                1 => same_net(r),
                                _ => l.color == r.color,
                            }
                    });
                    if let Some((j, r)) = found {
                        taken[j] = true;
                        matched[i] = true;
                        pins.insert(l.key(), r.key());
                    }
                }
            }
        }

        self.pins = pins;
    }

    /// Map still-unmapped floating networks by following matched pins.
    /// The first pin pair (in key order) to reach a network decides it.
    pub fn derive_networks_from_pins(&mut self, floating: &BpcGraph, fixed: &BpcGraph) {
        let mut used: BTreeSet<NetworkId> = self.networks.values().cloned().collect();
        for (from, to) in &self.pins {
            let (Some(l), Some(r)) = (floating.get_pin(from), fixed.get_pin(to)) else {
                continue;
            };
            if self.networks.contains_key(&l.network_id) || used.contains(&r.network_id) {
                continue;
            }
            used.insert(r.network_id.clone());
            self.networks.insert(l.network_id.clone(), r.network_id.clone());
        }
    }

    /// Check that every id exists on its side and no template id is used twice.
    pub fn validate(&self, floating: &BpcGraph, fixed: &BpcGraph) -> Result<()> {
        let mut targets = BTreeSet::new();
        for (from, to) in &self.boxes {
            if !floating.contains_box(from) || !fixed.contains_box(to) {
                return Err(SchemalignError::InvalidAssignment(format!("unknown box pair {} -> {}", from, to)));
            }
            if !targets.insert(to) {
                return Err(SchemalignError::InvalidAssignment(format!("template box {} assigned twice", to)));
            }
        }

        let mut targets = BTreeSet::new();
        for (from, to) in &self.pins {
            if floating.get_pin(from).is_none() || fixed.get_pin(to).is_none() {
                return Err(SchemalignError::InvalidAssignment(format!("unknown pin pair {} -> {}", from, to)));
            }
            if !targets.insert(to) {
                return Err(SchemalignError::InvalidAssignment(format!("template pin {} assigned twice", to)));
            }
        }

        let fixed_nets = fixed.network_ids();
        let mut targets = BTreeSet::new();
        for (from, to) in &self.networks {
            if !fixed_nets.contains(to) {
                return Err(SchemalignError::InvalidAssignment(format!("unknown network {} -> {}", from, to)));
            }
            if !targets.insert(to) {
                return Err(SchemalignError::InvalidAssignment(format!("template network {} assigned twice", to)));
            }
        }
        Ok(())
    }
}

/// `PinKey` is not a string, so the pin map travels as a list of pairs.
mod pin_pairs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    use crate::graph::PinKey;

    pub fn serialize<S: Serializer>(pins: &BTreeMap<PinKey, PinKey>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(pins.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<PinKey, PinKey>, D::Error> {
        let pairs: Vec<(PinKey, PinKey)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// A way of building an [`Assignment`]
pub trait AssignmentStrategy {
    fn name(&self) -> &'static str;

    fn assign(&self, floating: &BpcGraph, fixed: &BpcGraph) -> Result<Assignment>;
}

/// Selectable strategy, e.g. from CLI flags or [`crate::core::LayoutOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Histogram,
    WlBucket,
    Exhaustive,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Histogram => "histogram",
            StrategyKind::WlBucket => "wl_bucket",
            StrategyKind::Exhaustive => "exhaustive",
        }
    }

    pub fn build(self, options: &AssignmentOptions) -> Box<dyn AssignmentStrategy> {
        match self {
            StrategyKind::Histogram => Box::new(HistogramStrategy::new(options.histogram.clone())),
            StrategyKind::WlBucket => Box::new(WlBucketStrategy::new(options.wl_bucket.clone())),
            StrategyKind::Exhaustive => Box::new(ExhaustiveStrategy::new(options.exhaustive.clone())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-strategy options
#[derive(Debug, Clone, Default)]
pub struct AssignmentOptions {
    pub histogram: HistogramOptions,
    pub wl_bucket: WlBucketOptions,
    pub exhaustive: ExhaustiveOptions,
}

/// Assign with a strategy picked at runtime.
pub fn assign(kind: StrategyKind, options: &AssignmentOptions, floating: &BpcGraph, fixed: &BpcGraph) -> Result<Assignment> {
    let strategy = kind.build(options);
    let assignment = strategy.assign(floating, fixed)?;
    tracing::debug!(
        "{} assignment: {} box(es), {} network(s), {} pin(s)",
        strategy.name(),
        assignment.boxes.len(),
        assignment.networks.len(),
        assignment.pins.len()
    );
    Ok(assignment)
}
