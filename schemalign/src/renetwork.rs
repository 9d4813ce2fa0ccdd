//! Renetworking: constrained network splitting
//!
//! Every network is re-examined under a caller-supplied "still connected"
//! predicate. Pins of one network that are no longer linked by a chain of
//! predicate-true pairs end up in separate networks: the first component
//! keeps the original id, each further component gets a fresh
//! `<network>_<counter>` id that is unused anywhere in the graph.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Result, SchemalignError};
use crate::graph::{BoxId, BpcBox, BpcGraph, BpcPin, Color, NetworkId, Point};

/// A pin together with its owning box
#[derive(Debug, Clone, Copy)]
pub struct PinContext<'a> {
    pub owner: &'a BpcBox,
    pub pin: &'a BpcPin,
}

impl PinContext<'_> {
    /// Box centre (origin when unknown) plus pin offset
    pub fn absolute_position(&self) -> Point {
        self.owner.center().unwrap_or_default().plus(&self.pin.offset)
    }
}

/// Decides whether two pins of one network stay electrically joined.
pub trait ConnectivityPredicate {
    fn still_connected(&self, from: &PinContext<'_>, to: &PinContext<'_>, network: &NetworkId) -> bool;
}

impl<F> ConnectivityPredicate for F
where
    F: Fn(&PinContext<'_>, &PinContext<'_>, &NetworkId) -> bool,
{
    fn still_connected(&self, from: &PinContext<'_>, to: &PinContext<'_>, network: &NetworkId) -> bool {
        self(from, to, network)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn coordinate(self, p: &Point) -> f64 {
        match self {
            Axis::Horizontal => p.x,
            Axis::Vertical => p.y,
        }
    }
}

/// "Same side of a reference point" along one axis. Pins whose color is
/// listed in `always_connected` (power rails) never split.
#[derive(Debug, Clone)]
pub struct SameSidePredicate {
    pub reference: Point,
    pub axis: Axis,
    pub always_connected: BTreeSet<Color>,
}

impl SameSidePredicate {
    pub fn new(reference: Point, axis: Axis) -> Self {
        Self {
            reference,
            axis,
            always_connected: default_power_colors(),
        }
    }

    /// Reference at a box's centre (origin for a floating box without one).
    pub fn around_box(graph: &BpcGraph, box_id: &BoxId, axis: Axis) -> Result<Self> {
        let owner = graph.require_box(box_id)?;
        Ok(Self::new(owner.center().unwrap_or_default(), axis))
    }

    pub fn with_always_connected(mut self, colors: BTreeSet<Color>) -> Self {
        self.always_connected = colors;
        self
    }

    fn side(&self, ctx: &PinContext<'_>) -> Ordering {
        let value = self.axis.coordinate(&ctx.absolute_position());
        let reference = self.axis.coordinate(&self.reference);
        value.partial_cmp(&reference).unwrap_or(Ordering::Equal)
    }
}

impl ConnectivityPredicate for SameSidePredicate {
    fn still_connected(&self, from: &PinContext<'_>, to: &PinContext<'_>, _network: &NetworkId) -> bool {
        if self.always_connected.contains(&from.pin.color) || self.always_connected.contains(&to.pin.color) {
            return true;
        }
        self.side(from) == self.side(to)
    }
}

/// Colors treated as shared power rails by default
pub fn default_power_colors() -> BTreeSet<Color> {
    ["vcc", "gnd"].into_iter().map(Color::from).collect()
}

/// Output of [`renetwork`]
#[derive(Debug, Clone)]
pub struct RenetworkResult {
    pub graph: BpcGraph,
    /// Every newly minted network id → the id it was split from
    pub origins: BTreeMap<NetworkId, NetworkId>,
}

impl RenetworkResult {
    pub fn split_count(&self) -> usize {
        self.origins.len()
    }
}

/// Split networks according to `predicate`, returning a new graph.
///
/// The predicate is evaluated once per unordered pin pair, earlier pin
/// (graph order) first. The input graph is untouched.
pub fn renetwork<P>(graph: &BpcGraph, predicate: &P) -> Result<RenetworkResult>
where
    P: ConnectivityPredicate + ?Sized,
{
    let owners: BTreeMap<&BoxId, &BpcBox> = graph.boxes.iter().map(|b| (&b.box_id, b)).collect();
    let mut contexts = Vec::with_capacity(graph.pins.len());
    for pin in &graph.pins {
        let owner = owners.get(&pin.box_id).copied().ok_or_else(|| SchemalignError::MissingBox {
            box_id: pin.box_id.clone(),
            pin_id: pin.pin_id.clone(),
        })?;
        contexts.push(PinContext { owner, pin });
    }

    let mut used: BTreeSet<NetworkId> = graph.network_ids();
    let mut counter = 0usize;
    let mut out = graph.clone();
    let mut origins = BTreeMap::new();

    for (network, members) in graph.networks() {
        let components = split_members(&members, &contexts, &network, predicate);
        for component in components.iter().skip(1) {
            let minted = loop {
                counter += 1;
                let candidate = NetworkId::new(format!("{}_{}", network, counter));
                if !used.contains(&candidate) {
                    break candidate;
                }
            };
            used.insert(minted.clone());
            for &pin_idx in component {
                out.pins[pin_idx].network_id = minted.clone();
            }
            origins.insert(minted, network.clone());
        }
        if components.len() > 1 {
            tracing::debug!("Split network {} into {} parts", network, components.len());
        }
    }

    Ok(RenetworkResult { graph: out, origins })
}

/// Connected components (petgraph's stack-based DFS) over one network's
/// pins. Components are discovered from the lowest unvisited member.
fn split_members<P>(
    members: &[usize],
    contexts: &[PinContext<'_>],
    network: &NetworkId,
    predicate: &P,
) -> Vec<Vec<usize>>
where
    P: ConnectivityPredicate + ?Sized,
{
    let n = members.len();
    let mut links: UnGraph<usize, ()> = UnGraph::with_capacity(n, 0);
    let nodes: Vec<NodeIndex> = members.iter().map(|&m| links.add_node(m)).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if predicate.still_connected(&contexts[members[i]], &contexts[members[j]], network) {
                links.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for &start in &nodes {
        if visited[start.index()] {
            continue;
        }
        let mut dfs = Dfs::new(&links, start);
        let mut component = Vec::new();
        while let Some(node) = dfs.next(&links) {
            visited[node.index()] = true;
            component.push(links[node]);
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}
