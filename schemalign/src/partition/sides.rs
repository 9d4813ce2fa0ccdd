//! Side classification and isolated-side discovery
//!
//! A pin's side is the edge of its owning box's bounding box it lies on.
//! The bounding box is spanned by the box's real (non-centre) pin offsets.
//! Screen coordinates are used: `Top` is the minimum Y edge.

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::{Result, SchemalignError};
use crate::graph::{BoxId, BpcBox, BpcGraph, BpcPin, Color, NetworkId};
use crate::renetwork::{default_power_colors, renetwork, ConnectivityPredicate, PinContext};

const EPSILON: f64 = 1e-9;

/// Cardinal direction of a pin on its box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a pin, or `None` for centre markers and interior pins.
///
/// An axis along which the box has no extent is ignored; a box whose
/// pins all sit on one point falls back to the sign of the pin offset.
pub fn pin_direction(graph: &BpcGraph, pin: &BpcPin) -> Option<Side> {
    if pin.is_center() {
        return None;
    }
    let bounds = graph.box_bounds(&pin.box_id)?;
    let (x, y) = (pin.offset.x, pin.offset.y);

    let has_width = bounds.width() > EPSILON;
    let has_height = bounds.height() > EPSILON;

    if has_width {
        if (x - bounds.min_x).abs() < EPSILON {
            return Some(Side::Left);
        }
        if (x - bounds.max_x).abs() < EPSILON {
            return Some(Side::Right);
        }
    }
    if has_height {
        if (y - bounds.min_y).abs() < EPSILON {
            return Some(Side::Top);
        }
        if (y - bounds.max_y).abs() < EPSILON {
            return Some(Side::Bottom);
        }
    }
    if has_width || has_height {
        return None;
    }

    if x.abs() < EPSILON && y.abs() < EPSILON {
        None
    } else if x.abs() >= y.abs() {
        Some(if x < 0.0 { Side::Left } else { Side::Right })
    } else {
        Some(if y < 0.0 { Side::Top } else { Side::Bottom })
    }
}

/// Real pins of a box grouped by side
pub fn box_sides<'a>(graph: &'a BpcGraph, box_id: &BoxId) -> Result<BTreeMap<Side, Vec<&'a BpcPin>>> {
    graph.require_box(box_id)?;
    let mut sides: BTreeMap<Side, Vec<&BpcPin>> = BTreeMap::new();
    for pin in graph.pins.iter().filter(|p| &p.box_id == box_id) {
        if let Some(side) = pin_direction(graph, pin) {
            sides.entry(side).or_default().push(pin);
        }
    }
    Ok(sides)
}

/// Id of the side-specific copy of a box (`U1#left`, or `U1#all`).
pub fn side_box_id(box_id: &BoxId, side: Option<Side>) -> BoxId {
    BoxId::new(format!(
        "{}#{}",
        box_id,
        side.map(Side::as_str).unwrap_or("all")
    ))
}

/// Sub-graph holding a side-specific copy of `box_id` and only its pins
/// on `side`; with `side = None` every pin of the box is kept.
pub fn get_box_side_subgraph(graph: &BpcGraph, box_id: &BoxId, side: Option<Side>) -> Result<BpcGraph> {
    let owner = graph.require_box(box_id)?;
    let copy_id = side_box_id(box_id, side);

    let pins: Vec<BpcPin> = graph
        .pins
        .iter()
        .filter(|p| &p.box_id == box_id)
        .filter(|p| match side {
            None => true,
            Some(s) => pin_direction(graph, p) == Some(s),
        })
        .map(|p| BpcPin {
            box_id: copy_id.clone(),
            ..p.clone()
        })
        .collect();

    if let Some(s) = side {
        if pins.is_empty() {
            return Err(SchemalignError::SideNotFound {
                box_id: box_id.clone(),
                side: s,
            });
        }
    }

    Ok(BpcGraph {
        boxes: vec![BpcBox {
            box_id: copy_id,
            ..owner.clone()
        }],
        pins,
    })
}

/// Options for [`find_isolated_box_sides`]
#[derive(Debug, Clone)]
pub struct IsolationOptions {
    /// Pins of these colors never bind sides together. Empty by default,
    /// so power rails join the sides they touch like any other network.
    pub shared_colors: BTreeSet<Color>,
    /// A box with exactly two real pins conducts between its networks.
    pub bridge_two_pin_boxes: bool,
}

impl Default for IsolationOptions {
    fn default() -> Self {
        Self {
            shared_colors: BTreeSet::new(),
            bridge_two_pin_boxes: true,
        }
    }
}

impl IsolationOptions {
    /// Treat the default power rails as shared: they no longer bind sides.
    pub fn with_power_rails_shared(mut self) -> Self {
        self.shared_colors = default_power_colors();
        self
    }
}

/// Keeps a network whole across side copies. Centre markers and shared
/// colors are cut loose.
struct SideLink<'a> {
    shared_colors: &'a BTreeSet<Color>,
}

impl SideLink<'_> {
    fn links(&self, pin: &BpcPin) -> bool {
        !pin.is_center() && !self.shared_colors.contains(&pin.color)
    }
}

impl ConnectivityPredicate for SideLink<'_> {
    fn still_connected(&self, from: &PinContext<'_>, to: &PinContext<'_>, _network: &NetworkId) -> bool {
        self.links(from.pin) && self.links(to.pin)
    }
}

/// Clusters of sides of `box_id` that must travel together because a
/// network (directly, or through a two-pin part) spans them.
///
/// The box is replaced by one copy per side and the result is renetworked;
/// sides whose copies end up sharing a network form one cluster. Each
/// cluster is sorted; clusters are ordered by their first side. A box
/// without real pins yields no clusters.
pub fn find_isolated_box_sides(
    graph: &BpcGraph,
    box_id: &BoxId,
    options: &IsolationOptions,
) -> Result<Vec<Vec<Side>>> {
    let sides: Vec<Side> = box_sides(graph, box_id)?.into_keys().collect();
    if sides.is_empty() {
        return Ok(Vec::new());
    }

    let mut merged = BpcGraph {
        boxes: graph.boxes.iter().filter(|b| &b.box_id != box_id).cloned().collect(),
        pins: graph.pins.iter().filter(|p| &p.box_id != box_id).cloned().collect(),
    };
    let mut copies = Vec::with_capacity(sides.len());
    for &side in &sides {
        let sub = get_box_side_subgraph(graph, box_id, Some(side))?;
        copies.push(side_box_id(box_id, Some(side)));
        merged.boxes.extend(sub.boxes);
        merged.pins.extend(sub.pins);
    }

    let merged = renetwork(
        &merged,
        &SideLink {
            shared_colors: &options.shared_colors,
        },
    )?
    .graph;

    let mut pins_uf = UnionFind::<usize>::new(merged.pins.len());
    for members in merged.networks().values() {
        for pair in members.windows(2) {
            pins_uf.union(pair[0], pair[1]);
        }
    }

    if options.bridge_two_pin_boxes {
        for bx in &merged.boxes {
            if copies.contains(&bx.box_id) {
                continue;
            }
            let real: Vec<usize> = merged
                .pins
                .iter()
                .enumerate()
                .filter(|(_, p)| p.box_id == bx.box_id && !p.is_center())
                .map(|(i, _)| i)
                .collect();
            if real.len() == 2 {
                pins_uf.union(real[0], real[1]);
            }
        }
    }

    let roots: Vec<BTreeSet<usize>> = copies
        .iter()
        .map(|copy| {
            merged
                .pins
                .iter()
                .enumerate()
                .filter(|(_, p)| &p.box_id == copy)
                .map(|(i, _)| pins_uf.find(i))
                .collect()
        })
        .collect();

    let mut sides_uf = UnionFind::<usize>::new(sides.len());
    for i in 0..sides.len() {
        for j in (i + 1)..sides.len() {
            if !roots[i].is_disjoint(&roots[j]) {
                sides_uf.union(i, j);
            }
        }
    }

    let mut clusters: BTreeMap<usize, Vec<Side>> = BTreeMap::new();
    for (i, &side) in sides.iter().enumerate() {
        clusters.entry(sides_uf.find(i)).or_default().push(side);
    }
    let mut clusters: Vec<Vec<Side>> = clusters.into_values().collect();
    for cluster in &mut clusters {
        cluster.sort();
    }
    clusters.sort();
    tracing::debug!("Box {} has {} isolated side cluster(s)", box_id, clusters.len());
    Ok(clusters)
}
