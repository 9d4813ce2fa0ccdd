//! Merging adapted partitions back into one graph

use crate::graph::{BpcGraph, Point};

/// Stitch adapted partition graphs together.
///
/// Each piece is translated so that its first box already placed by an
/// earlier piece lands on that box's existing centre; a piece sharing no
/// placed box is taken as is. On id clashes the first occurrence wins.
pub fn merge_partitions(pieces: &[BpcGraph]) -> BpcGraph {
    let mut out = BpcGraph::new();

    for (i, piece) in pieces.iter().enumerate() {
        let offset = piece
            .boxes
            .iter()
            .find_map(|b| {
                let placed = out.get_box(&b.box_id)?.center()?;
                Some(placed.minus(&b.center()?))
            })
            .unwrap_or_default();
        if offset != Point::default() {
            tracing::debug!("Piece {} anchored with offset ({:.3}, {:.3})", i, offset.x, offset.y);
        }

        for bx in &piece.boxes {
            if out.contains_box(&bx.box_id) {
                continue;
            }
            let mut moved = bx.clone();
            moved.placement = bx.placement.translated(offset.x, offset.y);
            out.add_box(moved);
        }
        for pin in &piece.pins {
            if out.get_pin(&pin.key()).is_none() {
                out.add_pin(pin.clone());
            }
        }
    }

    out
}
