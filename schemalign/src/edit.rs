//! Edit-operation synthesis
//!
//! Turns a source adjacency matrix into a target one under a node
//! assignment (source id → target id):
//!
//! 1. delete unassigned source nodes, highest index first
//! 2. create one synthetic node per unassigned target node
//! 3. swap nodes into the target's index order
//! 4. toggle every edge that still differs
//!
//! Every step is logged as an [`EditOperation`]; replaying the log with
//! [`replay`] reproduces the target matrix.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::assignment::Assignment;
use crate::core::{Result, SchemalignError};
use crate::graph::{BpcGraph, FlattenedGraph, IndexedMatrix, NodeKey};

/// One atomic matrix edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    DeleteNode {
        node: NodeKey,
        index: usize,
    },
    CreateNode {
        node: NodeKey,
        index: usize,
        target: NodeKey,
    },
    /// `first_index < second_index`; indices are taken before the swap.
    SwapIndices {
        first: NodeKey,
        first_index: usize,
        second: NodeKey,
        second_index: usize,
    },
    ConnectNodes {
        first: NodeKey,
        first_index: usize,
        second: NodeKey,
        second_index: usize,
    },
    DisconnectNodes {
        first: NodeKey,
        first_index: usize,
        second: NodeKey,
        second_index: usize,
    },
}

impl EditOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::DeleteNode { .. } => "delete_node",
            EditOperation::CreateNode { .. } => "create_node",
            EditOperation::SwapIndices { .. } => "swap_indices",
            EditOperation::ConnectNodes { .. } => "connect_nodes",
            EditOperation::DisconnectNodes { .. } => "disconnect_nodes",
        }
    }
}

/// Output of [`synthesize_edits`]
#[derive(Debug, Clone)]
pub struct EditScript {
    pub operations: Vec<EditOperation>,
    /// Source matrix after every operation; equal in shape and content
    /// to the target matrix.
    pub result: IndexedMatrix,
    /// Completed assignment, synthetic nodes included
    pub assignment: BTreeMap<NodeKey, NodeKey>,
}

impl EditScript {
    /// Operation count per kind
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.kind()).or_insert(0) += 1;
        }
        counts
    }
}

fn check_assignment(
    source: &IndexedMatrix,
    target: &IndexedMatrix,
    assignment: &BTreeMap<NodeKey, NodeKey>,
) -> Result<()> {
    let mut images = BTreeSet::new();
    for (from, to) in assignment {
        if source.index_of(from).is_none() {
            return Err(SchemalignError::InvalidAssignment(format!("unknown source node {}", from)));
        }
        if target.index_of(to).is_none() {
            return Err(SchemalignError::InvalidAssignment(format!("unknown target node {}", to)));
        }
        if !images.insert(to) {
            return Err(SchemalignError::InvalidAssignment(format!("target node {} assigned twice", to)));
        }
    }
    Ok(())
}

/// Synthesize the edit log that turns `source` into `target`.
pub fn synthesize_edits(
    source: &IndexedMatrix,
    target: &IndexedMatrix,
    assignment: &BTreeMap<NodeKey, NodeKey>,
) -> Result<EditScript> {
    check_assignment(source, target, assignment)?;

    let mut working = source.clone();
    let mut mapping = assignment.clone();
    let mut operations = Vec::new();

    let mut doomed: Vec<(usize, NodeKey)> = source
        .index
        .iter()
        .filter(|(key, _)| !assignment.contains_key(*key))
        .map(|(key, &i)| (i, key.clone()))
        .collect();
    doomed.sort_by(|a, b| b.0.cmp(&a.0));
    for (index, node) in doomed {
        working.remove(&node);
        operations.push(EditOperation::DeleteNode { node, index });
    }

    let mut serial = source
        .index
        .keys()
        .filter_map(|key| match key {
            NodeKey::Synthetic { serial } => Some(serial + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    let assigned: BTreeSet<&NodeKey> = assignment.values().collect();
    for target_key in target.keys_in_order() {
        if assigned.contains(&target_key) {
            continue;
        }
        let node = NodeKey::Synthetic { serial };
        serial += 1;
        let index = working.push(node.clone());
        mapping.insert(node.clone(), target_key.clone());
        operations.push(EditOperation::CreateNode {
            node,
            index,
            target: target_key,
        });
    }

    let by_target: BTreeMap<&NodeKey, &NodeKey> = mapping.iter().map(|(s, t)| (t, s)).collect();
    for (position, target_key) in target.keys_in_order().iter().enumerate() {
        let Some(&node) = by_target.get(target_key) else {
            continue;
        };
        let Some(current) = working.index_of(node) else {
            continue;
        };
        if current == position {
            continue;
        }
        let Some(occupant) = working.key_at(position).cloned() else {
            continue;
        };
        working.swap(node, &occupant);
        let (first, first_index, second, second_index) = if position < current {
            (occupant, position, node.clone(), current)
        } else {
            (node.clone(), current, occupant, position)
        };
        operations.push(EditOperation::SwapIndices {
            first,
            first_index,
            second,
            second_index,
        });
    }

    let order = working.keys_in_order();
    let n = working.len().min(target.len());
    for i in 0..n {
        for j in i..n {
            let wanted = target.matrix.get(i, j);
            if working.matrix.get(i, j) == wanted {
                continue;
            }
            working.matrix.set_symmetric(i, j, wanted);
            let (first, second) = (order[i].clone(), order[j].clone());
            operations.push(if wanted != 0 {
                EditOperation::ConnectNodes {
                    first,
                    first_index: i,
                    second,
                    second_index: j,
                }
            } else {
                EditOperation::DisconnectNodes {
                    first,
                    first_index: i,
                    second,
                    second_index: j,
                }
            });
        }
    }

    tracing::debug!("Synthesized {} edit operation(s)", operations.len());
    Ok(EditScript {
        operations,
        result: working,
        assignment: mapping,
    })
}

/// Edit log between two graphs' flattened views under a box/pin assignment.
pub fn synthesize_graph_edits(floating: &BpcGraph, template: &BpcGraph, assignment: &Assignment) -> Result<EditScript> {
    let source = FlattenedGraph::from_graph(floating)?.indexed_matrix()?;
    let target = FlattenedGraph::from_graph(template)?.indexed_matrix()?;
    synthesize_edits(&source, &target, &assignment.node_assignment())
}

/// Apply one operation in place, addressing nodes by id.
///
/// An operation naming a node that is gone (or, for creation, already
/// present) is logged and skipped. Returns whether anything changed.
pub fn apply_operation(matrix: &mut IndexedMatrix, operation: &EditOperation) -> bool {
    let applied = match operation {
        EditOperation::DeleteNode { node, .. } => matrix.remove(node).is_some(),
        EditOperation::CreateNode { node, .. } => {
            if matrix.index_of(node).is_some() {
                false
            } else {
                matrix.push(node.clone());
                true
            }
        }
        EditOperation::SwapIndices { first, second, .. } => matrix.swap(first, second).is_some(),
        EditOperation::ConnectNodes { first, second, .. } | EditOperation::DisconnectNodes { first, second, .. } => {
            match (matrix.index_of(first), matrix.index_of(second)) {
                (Some(i), Some(j)) => {
                    let value = u8::from(matches!(operation, EditOperation::ConnectNodes { .. }));
                    matrix.matrix.set_symmetric(i, j, value);
                    true
                }
                _ => false,
            }
        }
    };
    if !applied {
        tracing::warn!("Skipping {} on a missing node: {:?}", operation.kind(), operation);
    }
    applied
}

/// Replay a whole log on a copy of `source`.
pub fn replay(source: &IndexedMatrix, operations: &[EditOperation]) -> IndexedMatrix {
    let mut matrix = source.clone();
    for op in operations {
        apply_operation(&mut matrix, op);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AdjacencyMatrix, BoxId};

    fn key(id: &str) -> NodeKey {
        NodeKey::for_box(&BoxId::from(id))
    }

    fn indexed(rows: Vec<Vec<u8>>, ids: &[&str]) -> IndexedMatrix {
        let index = ids.iter().enumerate().map(|(i, id)| (key(id), i)).collect();
        IndexedMatrix::new(AdjacencyMatrix::from_rows(rows).unwrap(), index).unwrap()
    }

    fn assign(pairs: &[(&str, &str)]) -> BTreeMap<NodeKey, NodeKey> {
        pairs.iter().map(|(a, b)| (key(a), key(b))).collect()
    }

    #[test]
    fn test_single_delete() {
        let source = indexed(AdjacencyMatrix::identity(3).rows().to_vec(), &["a", "b", "c"]);
        let target = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["x", "y"]);
        let script = synthesize_edits(&source, &target, &assign(&[("a", "x"), ("c", "y")])).unwrap();

        assert_eq!(
            script.operations,
            vec![EditOperation::DeleteNode {
                node: key("b"),
                index: 1
            }]
        );
        assert_eq!(script.result.index_of(&key("a")), Some(0));
        assert_eq!(script.result.index_of(&key("c")), Some(1));
        assert_eq!(script.result.matrix, target.matrix);
    }

    #[test]
    fn test_deletes_run_highest_index_first() {
        let source = indexed(AdjacencyMatrix::identity(4).rows().to_vec(), &["a", "b", "c", "d"]);
        let target = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["x", "y"]);
        let script = synthesize_edits(&source, &target, &assign(&[("b", "x"), ("d", "y")])).unwrap();
        let deleted: Vec<usize> = script
            .operations
            .iter()
            .filter_map(|op| match op {
                EditOperation::DeleteNode { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(deleted, vec![2, 0]);
    }

    #[test]
    fn test_create_swap_and_connect_round_trip() {
        let source = indexed(vec![vec![1, 0], vec![0, 1]], &["a", "b"]);
        let target = indexed(
            vec![vec![1, 1, 0], vec![1, 1, 1], vec![0, 1, 1]],
            &["x", "y", "z"],
        );
        // b sits where y's slot is not: needs a swap, a creation for z and edges.
        let script = synthesize_edits(&source, &target, &assign(&[("a", "y"), ("b", "x")])).unwrap();

        let summary = script.summary();
        assert_eq!(summary.get("create_node"), Some(&1));
        assert_eq!(summary.get("swap_indices"), Some(&1));
        assert_eq!(summary.get("connect_nodes"), Some(&2));
        assert_eq!(script.result.matrix, target.matrix);

        let images: BTreeSet<_> = script.assignment.values().cloned().collect();
        let target_ids: BTreeSet<_> = target.index.keys().cloned().collect();
        assert_eq!(images, target_ids);

        let replayed = replay(&source, &script.operations);
        assert_eq!(replayed.matrix, target.matrix);
        assert_eq!(replayed.index, script.result.index);
    }

    #[test]
    fn test_swap_recorded_lower_index_first() {
        let source = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["a", "b"]);
        let target = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["x", "y"]);
        let script = synthesize_edits(&source, &target, &assign(&[("a", "y"), ("b", "x")])).unwrap();
        assert_eq!(
            script.operations,
            vec![EditOperation::SwapIndices {
                first: key("a"),
                first_index: 0,
                second: key("b"),
                second_index: 1
            }]
        );
    }

    #[test]
    fn test_disconnect() {
        let source = indexed(vec![vec![1, 1], vec![1, 1]], &["a", "b"]);
        let target = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["x", "y"]);
        let script = synthesize_edits(&source, &target, &assign(&[("a", "x"), ("b", "y")])).unwrap();
        assert_eq!(script.operations.len(), 1);
        assert_eq!(script.operations[0].kind(), "disconnect_nodes");
    }

    #[test]
    fn test_invalid_assignment() {
        let source = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["a", "b"]);
        let target = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["x", "y"]);
        assert!(synthesize_edits(&source, &target, &assign(&[("a", "x"), ("b", "x")])).is_err());
        assert!(synthesize_edits(&source, &target, &assign(&[("q", "x")])).is_err());
    }

    #[test]
    fn test_missing_node_is_a_no_op() {
        let mut matrix = indexed(AdjacencyMatrix::identity(2).rows().to_vec(), &["a", "b"]);
        let op = EditOperation::DeleteNode {
            node: key("zz"),
            index: 5,
        };
        assert!(!apply_operation(&mut matrix, &op));
        assert_eq!(matrix.len(), 2);

        // Replaying a delete twice only removes once.
        let delete = EditOperation::DeleteNode {
            node: key("a"),
            index: 0,
        };
        let replayed = replay(&matrix, &[delete.clone(), delete]);
        assert_eq!(replayed.len(), 1);
    }

    #[test]
    fn test_operation_json_tag() {
        let op = EditOperation::DeleteNode {
            node: key("a"),
            index: 0,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "delete_node");
        assert_eq!(json["node"]["type"], "box");
    }
}
