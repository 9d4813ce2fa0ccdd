//! Partitioning of a floating graph into independently matchable pieces

pub mod processor;
pub mod sides;

pub use processor::{partition_graph, Partition, PartitionOptions, SchematicPartitionProcessor, StepOutcome};
pub use sides::{
    box_sides, find_isolated_box_sides, get_box_side_subgraph, pin_direction, side_box_id, IsolationOptions, Side,
};
