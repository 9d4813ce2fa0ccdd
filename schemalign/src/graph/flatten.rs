//! Flattened graph view
//!
//! One abstract node per box and per pin, with undirected edges
//! pin ↔ owning box and pin ↔ pin for every pair sharing a network.
//! The view is rebuilt on demand and never mutated.

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::matrix::{AdjacencyMatrix, IndexedMatrix};
use super::types::{BoxId, BpcGraph, Color, PinId, PinKey};
use crate::core::{Result, SchemalignError};

/// Identity of a node in the flattened view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKey {
    Box { box_id: BoxId },
    Pin { box_id: BoxId, pin_id: PinId },
    /// Node minted by edit synthesis with no source counterpart
    Synthetic { serial: usize },
}

impl NodeKey {
    pub fn for_box(box_id: &BoxId) -> Self {
        NodeKey::Box {
            box_id: box_id.clone(),
        }
    }

    pub fn for_pin(key: &PinKey) -> Self {
        NodeKey::Pin {
            box_id: key.box_id.clone(),
            pin_id: key.pin_id.clone(),
        }
    }

    pub fn is_box(&self) -> bool {
        matches!(self, NodeKey::Box { .. })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Box { box_id } => write!(f, "box:{}", box_id),
            NodeKey::Pin { box_id, pin_id } => write!(f, "pin:{}/{}", box_id, pin_id),
            NodeKey::Synthetic { serial } => write!(f, "new:{}", serial),
        }
    }
}

/// How round-0 WL labels are derived from a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Labeling {
    /// Boxes are `box`, pins carry their color.
    Colors,
    /// Boxes are `box`; pins keep their color only if it is listed,
    /// otherwise they are plain `pin`.
    Structural(BTreeSet<Color>),
    /// No labels; every node starts with the placeholder color.
    Unlabeled,
}

/// Flattened undirected view of a [`BpcGraph`]
#[derive(Debug, Clone)]
pub struct FlattenedGraph {
    graph: UnGraph<NodeKey, ()>,
    indices: BTreeMap<NodeKey, NodeIndex>,
    /// Round-0 label candidates per node, parallel to node indices
    colors: Vec<Option<Color>>,
}

impl FlattenedGraph {
    /// Flatten a graph. Boxes come first (graph order), then pins (graph order).
    pub fn from_graph(source: &BpcGraph) -> Result<Self> {
        let mut graph = UnGraph::new_undirected();
        let mut indices = BTreeMap::new();
        let mut colors = Vec::with_capacity(source.boxes.len() + source.pins.len());

        for bx in &source.boxes {
            let key = NodeKey::for_box(&bx.box_id);
            let idx = graph.add_node(key.clone());
            indices.insert(key, idx);
            colors.push(None);
        }

        let mut pin_nodes = Vec::with_capacity(source.pins.len());
        for pin in &source.pins {
            let owner = indices
                .get(&NodeKey::for_box(&pin.box_id))
                .copied()
                .ok_or_else(|| SchemalignError::MissingBox {
                    box_id: pin.box_id.clone(),
                    pin_id: pin.pin_id.clone(),
                })?;
            let key = NodeKey::for_pin(&pin.key());
            let idx = graph.add_node(key.clone());
            indices.insert(key, idx);
            colors.push(Some(pin.color.clone()));
            graph.add_edge(idx, owner, ());
            pin_nodes.push(idx);
        }

        for members in source.networks().values() {
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    graph.add_edge(pin_nodes[a], pin_nodes[b], ());
                }
            }
        }

        Ok(Self {
            graph,
            indices,
            colors,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn graph(&self) -> &UnGraph<NodeKey, ()> {
        &self.graph
    }

    /// Node keys in index order
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.graph.node_weights()
    }

    pub fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.indices.get(key).map(|idx| idx.index())
    }

    /// Adjacency matrix with self-loops on the diagonal
    pub fn adjacency(&self) -> AdjacencyMatrix {
        let mut matrix = AdjacencyMatrix::identity(self.node_count());
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                matrix.set_symmetric(a.index(), b.index(), 1);
            }
        }
        matrix
    }

    /// Adjacency matrix paired with the node → index mapping
    pub fn indexed_matrix(&self) -> Result<IndexedMatrix> {
        let index = self
            .indices
            .iter()
            .map(|(key, idx)| (key.clone(), idx.index()))
            .collect();
        IndexedMatrix::new(self.adjacency(), index)
    }

    /// Round-0 labels for every node, in index order.
    pub fn labels(&self, labeling: &Labeling) -> Vec<Option<String>> {
        self.colors
            .iter()
            .map(|color| match (labeling, color) {
                (Labeling::Unlabeled, _) => None,
                (_, None) => Some("box".to_string()),
                (Labeling::Colors, Some(c)) => Some(c.to_string()),
                (Labeling::Structural(kept), Some(c)) if kept.contains(c) => Some(c.to_string()),
                (Labeling::Structural(_), Some(_)) => Some("pin".to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BpcBox, BpcPin};

    fn two_box_graph() -> BpcGraph {
        BpcGraph::new()
            .with_box(BpcBox::floating("A"))
            .with_box(BpcBox::floating("B"))
            .with_pin(BpcPin::new("A", "P1", "N1", "red"))
            .with_pin(BpcPin::new("A", "P2", "N2", "blue"))
            .with_pin(BpcPin::new("B", "P1", "N1", "red"))
    }

    #[test]
    fn test_flatten_shape() {
        let flat = FlattenedGraph::from_graph(&two_box_graph()).unwrap();
        assert_eq!(flat.node_count(), 5);
        // 3 pin-box edges + 1 shared-network edge
        assert_eq!(flat.edge_count(), 4);

        let m = flat.adjacency();
        for i in 0..m.len() {
            assert_eq!(m.get(i, i), 1);
        }
        let a_p1 = flat.index_of(&NodeKey::for_pin(&PinKey::new("A", "P1"))).unwrap();
        let b_p1 = flat.index_of(&NodeKey::for_pin(&PinKey::new("B", "P1"))).unwrap();
        assert_eq!(m.get(a_p1, b_p1), 1);
        assert_eq!(m.get(b_p1, a_p1), 1);
    }

    #[test]
    fn test_flatten_missing_box() {
        let graph = two_box_graph().with_pin(BpcPin::new("Z", "1", "N1", "red"));
        assert!(matches!(
            FlattenedGraph::from_graph(&graph),
            Err(SchemalignError::MissingBox { .. })
        ));
    }

    #[test]
    fn test_labels() {
        let flat = FlattenedGraph::from_graph(&two_box_graph()).unwrap();
        let labels = flat.labels(&Labeling::Colors);
        assert_eq!(labels[0].as_deref(), Some("box"));
        assert_eq!(labels[2].as_deref(), Some("red"));

        let kept: BTreeSet<Color> = [Color::from("blue")].into_iter().collect();
        let labels = flat.labels(&Labeling::Structural(kept));
        assert_eq!(labels[2].as_deref(), Some("pin"));
        assert_eq!(labels[3].as_deref(), Some("blue"));

        assert!(flat.labels(&Labeling::Unlabeled).iter().all(Option::is_none));
    }

    #[test]
    fn test_empty_graph() {
        let flat = FlattenedGraph::from_graph(&BpcGraph::new()).unwrap();
        assert_eq!(flat.node_count(), 0);
        assert!(flat.indexed_matrix().unwrap().is_empty());
    }
}
