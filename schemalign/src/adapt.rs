//! Net adaptation: carrying a template's layout over to a floating graph
//!
//! [`net_adapt_graph`] rewrites a copy of the template under the floating
//! graph's ids. [`inherit_layout`] only copies positions onto a copy of the
//! floating graph, optionally pushing neighbours aside when a box is a
//! different size than its template counterpart.

use std::collections::{BTreeMap, BTreeSet};

use crate::assignment::Assignment;
use crate::core::{Result, SchemalignError};
use crate::edit::{synthesize_graph_edits, EditOperation};
use crate::graph::{BoxId, BpcBox, BpcGraph, BpcPin, NetworkId, PinId, PinKey, Placement, Point};
use crate::partition::sides::{pin_direction, Side};

const TEMPLATE_SUFFIX: &str = "_tpl";
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct AdaptOptions {
    /// Keep template boxes/pins without a floating counterpart as new
    /// floating structure instead of dropping them.
    pub keep_template_accessories: bool,
    /// Attach the floating → template edit log to the result.
    pub record_edits: bool,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            keep_template_accessories: false,
            record_edits: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdaptResult {
    pub graph: BpcGraph,
    pub operations: Vec<EditOperation>,
    /// Template boxes carried over under (possibly suffixed) ids
    pub accessories: Vec<BoxId>,
}

fn free_id<T: Ord>(base: &str, taken: &BTreeSet<T>, make: impl Fn(String) -> T) -> T {
    let mut candidate = base.to_string();
    loop {
        let id = make(candidate.clone());
        if !taken.contains(&id) {
            return id;
        }
        candidate.push_str(TEMPLATE_SUFFIX);
    }
}

/// Rewrite a copy of `template` so that it speaks the floating graph's ids.
///
/// - matched boxes take the floating id and stay fixed at the template centre
/// - matched pins take the floating id, color and network, and keep the
///   template offset
/// - unmatched template elements are dropped, or kept as floating
///   accessories with `keep_template_accessories`
/// - unmatched floating boxes and pins are appended unchanged
pub fn net_adapt_graph(
    floating: &BpcGraph,
    template: &BpcGraph,
    assignment: &Assignment,
    options: &AdaptOptions,
) -> Result<AdaptResult> {
    assignment.validate(floating, template)?;
    let inv_boxes = assignment.inverse_boxes();
    let inv_pins = assignment.inverse_pins();
    let inv_nets = assignment.inverse_networks();

    let mut taken_boxes: BTreeSet<BoxId> = floating.boxes.iter().map(|b| b.box_id.clone()).collect();
    let mut taken_nets: BTreeSet<NetworkId> = floating.network_ids();
    let mut net_renames: BTreeMap<NetworkId, NetworkId> = BTreeMap::new();
    let mut box_renames: BTreeMap<BoxId, BoxId> = BTreeMap::new();
    let mut accessories = Vec::new();
    let mut out = BpcGraph::new();

    for tb in &template.boxes {
        if let Some(fb) = inv_boxes.get(&tb.box_id) {
            let attributes = floating
                .get_box(fb)
                .map(|b| b.attributes.clone())
                .unwrap_or_default();
            let placement = match tb.center() {
                Some(center) => Placement::Fixed { center },
                None => Placement::Floating { center: None },
            };
            out.add_box(BpcBox {
                box_id: fb.clone(),
                placement,
                attributes,
            });
            box_renames.insert(tb.box_id.clone(), fb.clone());
        } else if options.keep_template_accessories {
            let id = free_id(tb.box_id.as_str(), &taken_boxes, BoxId::new);
            taken_boxes.insert(id.clone());
            out.add_box(BpcBox {
                box_id: id.clone(),
                placement: Placement::Floating { center: tb.center() },
                attributes: tb.attributes.clone(),
            });
            box_renames.insert(tb.box_id.clone(), id.clone());
            accessories.push(id);
        }
    }

    let mut matched_floating_pins = BTreeSet::new();
    for tp in &template.pins {
        let key = tp.key();
        if let Some(fkey) = inv_pins.get(&key) {
            let fp = floating
                .get_pin(fkey)
                .ok_or_else(|| SchemalignError::InvalidAssignment(format!("unknown pin {}", fkey)))?;
            if inv_boxes.get(&tp.box_id) != Some(&fp.box_id) {
                return Err(SchemalignError::InvalidAssignment(format!(
                    "pin {} -> {} crosses unmatched boxes",
                    fkey, key
                )));
            }
            matched_floating_pins.insert(fkey.clone());
            out.add_pin(BpcPin {
                offset: tp.offset,
                ..fp.clone()
            });
            continue;
        }

        if !options.keep_template_accessories {
            continue;
        }
        let Some(owner) = box_renames.get(&tp.box_id) else {
            continue;
        };
        let network_id = match inv_nets.get(&tp.network_id) {
            Some(net) => net.clone(),
            None => net_renames
                .entry(tp.network_id.clone())
                .or_insert_with(|| {
                    let id = free_id(tp.network_id.as_str(), &taken_nets, NetworkId::new);
                    taken_nets.insert(id.clone());
                    id
                })
                .clone(),
        };
        let taken_pins: BTreeSet<PinId> = floating.pins_of_box(owner).map(|p| p.pin_id.clone()).collect();
        out.add_pin(BpcPin {
            box_id: owner.clone(),
            pin_id: free_id(tp.pin_id.as_str(), &taken_pins, PinId::new),
            network_id,
            color: tp.color.clone(),
            offset: tp.offset,
        });
    }

    for fb in &floating.boxes {
        if !assignment.boxes.contains_key(&fb.box_id) {
            out.add_box(fb.clone());
        }
    }
    for fp in &floating.pins {
        if !matched_floating_pins.contains(&fp.key()) {
            out.add_pin(fp.clone());
        }
    }

    let operations = if options.record_edits {
        synthesize_graph_edits(floating, template, assignment)?.operations
    } else {
        Vec::new()
    };

    tracing::debug!(
        "Adapted template: {} box(es) matched, {} accessory box(es), {} edit(s)",
        assignment.boxes.len(),
        accessories.len(),
        operations.len()
    );
    Ok(AdaptResult {
        graph: out,
        operations,
        accessories,
    })
}

#[derive(Debug, Clone)]
pub struct InheritOptions {
    pub inherit_pin_offsets: bool,
    /// Move boxes beyond a resized box's dominant side by its size change.
    pub shift_resized_boxes: bool,
}

impl Default for InheritOptions {
    fn default() -> Self {
        Self {
            inherit_pin_offsets: true,
            shift_resized_boxes: false,
        }
    }
}

/// Side holding most of a box's real pins; ties go to the earlier side.
fn dominant_side(graph: &BpcGraph, box_id: &BoxId) -> Option<Side> {
    let mut counts: BTreeMap<Side, usize> = BTreeMap::new();
    for pin in graph.pins_of_box(box_id) {
        if let Some(side) = pin_direction(graph, pin) {
            *counts.entry(side).or_insert(0) += 1;
        }
    }
    let best = counts.values().copied().max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(side, _)| side)
}

/// Copy positions from the matched template boxes and pins onto a copy of
/// `floating`. Ids, colors and networks stay untouched.
pub fn inherit_layout(
    floating: &BpcGraph,
    template: &BpcGraph,
    assignment: &Assignment,
    options: &InheritOptions,
) -> Result<BpcGraph> {
    assignment.validate(floating, template)?;
    let mut out = floating.clone();

    for (fb, tb) in &assignment.boxes {
        let center = template.require_box(tb)?.center();
        if let (Some(center), Some(target)) = (center, out.get_box_mut(fb)) {
            target.placement = Placement::Fixed { center };
        }
    }

    if options.inherit_pin_offsets {
        let offsets: BTreeMap<&PinKey, Point> = assignment
            .pins
            .iter()
            .filter_map(|(f, t)| template.get_pin(t).map(|p| (f, p.offset)))
            .collect();
        for pin in &mut out.pins {
            if let Some(offset) = offsets.get(&pin.key()) {
                pin.offset = *offset;
            }
        }
    }

    if options.shift_resized_boxes {
        for (fb, tb) in &assignment.boxes {
            shift_for_resized_box(&mut out, floating, template, fb, tb);
        }
    }

    Ok(out)
}

fn shift_for_resized_box(out: &mut BpcGraph, floating: &BpcGraph, template: &BpcGraph, fb: &BoxId, tb: &BoxId) {
    let Some(side) = dominant_side(floating, fb) else {
        return;
    };
    let (Some(fbounds), Some(tbounds)) = (floating.box_bounds(fb), template.box_bounds(tb)) else {
        return;
    };
    let Some(anchor) = out.get_box(fb).and_then(BpcBox::center) else {
        return;
    };

    let delta = if side.is_horizontal() {
        fbounds.width() - tbounds.width()
    } else {
        fbounds.height() - tbounds.height()
    };
    if delta.abs() < EPSILON {
        return;
    }

    let (dx, dy) = match side {
        Side::Left => (-delta, 0.0),
        Side::Right => (delta, 0.0),
        Side::Top => (0.0, -delta),
        Side::Bottom => (0.0, delta),
    };
    let mut moved = 0usize;
    for bx in out.boxes.iter_mut().filter(|b| &b.box_id != fb) {
        let Some(c) = bx.center() else {
            continue;
        };
        let beyond = match side {
            Side::Left => c.x < anchor.x,
            Side::Right => c.x > anchor.x,
            Side::Top => c.y < anchor.y,
            Side::Bottom => c.y > anchor.y,
        };
        if beyond {
            bx.placement = bx.placement.translated(dx, dy);
            moved += 1;
        }
    }
    tracing::debug!("{} resized by {:.3} on its {} side; shifted {} box(es)", fb, delta, side, moved);
}
