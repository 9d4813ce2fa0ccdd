//! Graph model: BPC graphs, the flattened view and adjacency matrices

pub mod flatten;
pub mod matrix;
pub mod types;

pub use flatten::{FlattenedGraph, Labeling, NodeKey};
pub use matrix::{AdjacencyMatrix, IndexedMatrix};
pub use types::*;
