//! Square adjacency matrices and node-indexed matrices
//!
//! The matrix view of a flattened graph is what the WL engine refines and
//! what edit-operation synthesis rewrites. Every node carries a self-loop
//! (diagonal 1).

use std::collections::BTreeMap;

use super::flatten::NodeKey;
use crate::core::{Result, SchemalignError};

/// Square 0/1 adjacency matrix
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdjacencyMatrix {
    rows: Vec<Vec<u8>>,
}

impl AdjacencyMatrix {
    /// Build from raw rows, rejecting anything that is not square.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self> {
        let n = rows.len();
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(SchemalignError::NonSquareMatrix {
                rows: n,
                row,
                len: bad.len(),
            });
        }
        Ok(Self { rows })
    }

    /// `n × n` matrix with only the self-loops set
    pub fn identity(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| u8::from(i == j)).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> u8 {
        self.rows[i][j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: u8) {
        self.rows[i][j] = value;
    }

    /// Set both `(i, j)` and `(j, i)`.
    pub fn set_symmetric(&mut self, i: usize, j: usize, value: u8) {
        self.rows[i][j] = value;
        self.rows[j][i] = value;
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Indices `u` with a non-zero entry in row `v` (includes `v` itself via the self-loop).
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[v]
            .iter()
            .enumerate()
            .filter(|(_, &cell)| cell != 0)
            .map(|(u, _)| u)
    }

    /// Remove row and column `i`; higher indices shift down by one.
    pub fn remove_node(&mut self, i: usize) {
        self.rows.remove(i);
        for row in &mut self.rows {
            row.remove(i);
        }
    }

    /// Append an isolated node with a self-loop and return its index.
    pub fn push_node(&mut self) -> usize {
        for row in &mut self.rows {
            row.push(0);
        }
        let n = self.rows.len() + 1;
        let mut row = vec![0; n];
        row[n - 1] = 1;
        self.rows.push(row);
        n - 1
    }

    /// Swap rows `i`/`j` and columns `i`/`j`.
    pub fn swap_nodes(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.rows.swap(i, j);
        for row in &mut self.rows {
            row.swap(i, j);
        }
    }
}

/// An adjacency matrix paired with its node → index mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedMatrix {
    pub matrix: AdjacencyMatrix,
    pub index: BTreeMap<NodeKey, usize>,
}

impl IndexedMatrix {
    /// Pair a matrix with an index, checking that the index is a
    /// permutation of `0..n`.
    pub fn new(matrix: AdjacencyMatrix, index: BTreeMap<NodeKey, usize>) -> Result<Self> {
        let n = matrix.len();
        if index.len() != n {
            return Err(SchemalignError::InvalidIndexMapping(format!(
                "{} ids for a {}x{} matrix",
                index.len(),
                n,
                n
            )));
        }
        let mut seen = vec![false; n];
        for (key, &i) in &index {
            if i >= n || seen[i] {
                return Err(SchemalignError::InvalidIndexMapping(format!(
                    "index {} of node {} is out of range or repeated",
                    i, key
                )));
            }
            seen[i] = true;
        }
        Ok(Self { matrix, index })
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Node ids ordered by their matrix index
    pub fn keys_in_order(&self) -> Vec<NodeKey> {
        let mut keys: Vec<(usize, &NodeKey)> = self.index.iter().map(|(k, &i)| (i, k)).collect();
        keys.sort();
        keys.into_iter().map(|(_, k)| k.clone()).collect()
    }

    pub fn key_at(&self, i: usize) -> Option<&NodeKey> {
        self.index.iter().find(|(_, &idx)| idx == i).map(|(k, _)| k)
    }

    /// Remove a node and shift every higher index down. Returns the removed index.
    pub fn remove(&mut self, key: &NodeKey) -> Option<usize> {
        let removed = self.index.remove(key)?;
        self.matrix.remove_node(removed);
        for idx in self.index.values_mut() {
            if *idx > removed {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    /// Append an isolated node under `key`. Returns its index.
    pub fn push(&mut self, key: NodeKey) -> usize {
        let i = self.matrix.push_node();
        self.index.insert(key, i);
        i
    }

    /// Swap two nodes' rows/columns and their index entries.
    pub fn swap(&mut self, a: &NodeKey, b: &NodeKey) -> Option<(usize, usize)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.matrix.swap_nodes(ia, ib);
        self.index.insert(a.clone(), ib);
        self.index.insert(b.clone(), ia);
        Some((ia, ib))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BoxId;

    fn key(id: &str) -> NodeKey {
        NodeKey::Box {
            box_id: BoxId::from(id),
        }
    }

    #[test]
    fn test_non_square_rejected() {
        let err = AdjacencyMatrix::from_rows(vec![vec![1, 0], vec![0]]).unwrap_err();
        assert!(matches!(
            err,
            SchemalignError::NonSquareMatrix { rows: 2, row: 1, len: 1 }
        ));
    }

    #[test]
    fn test_remove_push_swap() {
        let mut m = AdjacencyMatrix::from_rows(vec![
            vec![1, 1, 0],
            vec![1, 1, 1],
            vec![0, 1, 1],
        ])
        .unwrap();

        m.swap_nodes(0, 2);
        assert_eq!(m.rows()[0], vec![1, 1, 0]);
        assert_eq!(m.rows()[1], vec![1, 1, 1]);

        m.remove_node(1);
        assert_eq!(m.rows(), &[vec![1, 0], vec![0, 1]]);

        let i = m.push_node();
        assert_eq!(i, 2);
        assert_eq!(m.rows()[2], vec![0, 0, 1]);
        assert_eq!(m.get(0, 2), 0);
    }

    #[test]
    fn test_indexed_remove_shifts() {
        let index: BTreeMap<NodeKey, usize> =
            [(key("a"), 0), (key("b"), 1), (key("c"), 2)].into_iter().collect();
        let mut im = IndexedMatrix::new(AdjacencyMatrix::identity(3), index).unwrap();
        assert_eq!(im.remove(&key("b")), Some(1));
        assert_eq!(im.index_of(&key("c")), Some(1));
        assert_eq!(im.keys_in_order(), vec![key("a"), key("c")]);
        assert_eq!(im.remove(&key("b")), None);
    }

    #[test]
    fn test_indexed_rejects_bad_index() {
        let index: BTreeMap<NodeKey, usize> = [(key("a"), 0), (key("b"), 0)].into_iter().collect();
        assert!(IndexedMatrix::new(AdjacencyMatrix::identity(2), index).is_err());
    }
}
