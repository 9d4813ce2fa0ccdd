//! Queue-driven schematic partitioner
//!
//! Every box with enough real pins seeds one partition per side it has
//! pins on. Partitions then spread breadth-first along networks, one
//! `(pin, partition)` work item per [`SchematicPartitionProcessor::step`]:
//!
//! - a pin already placed elsewhere is discarded unless its color is duplicable
//! - a pin whose box would repeat a singleton role in the partition is rejected
//! - an accepted pin enqueues its network mates and, for two-pin parts,
//!   the other pin of its box

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::sides::{pin_direction, Side};
use crate::core::{Result, SchemalignError};
use crate::graph::{BoxId, BpcGraph, Color, NetworkId, PinKey, SingletonKey, CENTER_COLOR};

/// Options for the partitioner
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    /// Pins of these colors may be placed in several partitions and are
    /// always carried along with their box.
    pub duplicable_colors: BTreeSet<Color>,
    /// Roles (`color/pinCount`) that may occur at most once per partition.
    pub singleton_keys: BTreeSet<SingletonKey>,
    /// Minimum number of real pins for a box to seed partitions.
    pub min_seed_pins: usize,
    /// Step budget enforced by [`SchematicPartitionProcessor::run`].
    pub max_iterations: usize,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            duplicable_colors: [Color::from(CENTER_COLOR)].into_iter().collect(),
            singleton_keys: [SingletonKey::from("vcc/2")].into_iter().collect(),
            min_seed_pins: 3,
            max_iterations: 1000,
        }
    }
}

/// A finished partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub id: usize,
    pub seed_box: BoxId,
    pub side: Side,
    pub boxes: BTreeSet<BoxId>,
    pub pins: BTreeSet<PinKey>,
    /// Singleton role → box holding it in this partition
    pub reserved_keys: BTreeMap<SingletonKey, BoxId>,
    /// Touched boxes with the accepted pins plus their duplicable pins
    pub graph: BpcGraph,
}

impl Partition {
    fn seeded(id: usize, seed_box: BoxId, side: Side) -> Self {
        Self {
            id,
            seed_box,
            side,
            boxes: BTreeSet::new(),
            pins: BTreeSet::new(),
            reserved_keys: BTreeMap::new(),
            graph: BpcGraph::new(),
        }
    }

    pub fn label(&self) -> String {
        format!("{}#{}", self.seed_box, self.side)
    }
}

/// What one step did with its work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted { pin: PinKey, partition: usize },
    /// Already placed and not duplicable
    Discarded { pin: PinKey, partition: usize },
    /// Box would repeat a singleton role held by `holder`
    Rejected {
        pin: PinKey,
        partition: usize,
        key: SingletonKey,
        holder: BoxId,
    },
}

/// Step-driven partitioner over one graph
pub struct SchematicPartitionProcessor<'a> {
    graph: &'a BpcGraph,
    options: PartitionOptions,
    partitions: Vec<Partition>,
    queue: VecDeque<(usize, usize)>,
    queued: BTreeSet<(usize, usize)>,
    placed: Vec<bool>,
    networks: BTreeMap<NetworkId, Vec<usize>>,
    box_keys: BTreeMap<BoxId, Vec<SingletonKey>>,
    mates: BTreeMap<BoxId, Vec<usize>>,
    steps: usize,
}

impl<'a> SchematicPartitionProcessor<'a> {
    /// Validate the graph, compute singleton roles and enqueue the seeds.
    pub fn new(graph: &'a BpcGraph, options: PartitionOptions) -> Result<Self> {
        graph.validate()?;

        let mut box_keys = BTreeMap::new();
        let mut mates = BTreeMap::new();
        for bx in &graph.boxes {
            let real: Vec<usize> = graph
                .pins
                .iter()
                .enumerate()
                .filter(|(_, p)| p.box_id == bx.box_id && !p.is_center())
                .map(|(i, _)| i)
                .collect();
            let keys: Vec<SingletonKey> = options
                .singleton_keys
                .iter()
                .filter(|key| match key.parts() {
                    Some((color, count)) => {
                        count == real.len() && real.iter().any(|&i| graph.pins[i].color == color)
                    }
                    None => false,
                })
                .cloned()
                .collect();
            box_keys.insert(bx.box_id.clone(), keys);
            mates.insert(bx.box_id.clone(), real);
        }

        let mut processor = Self {
            graph,
            options,
            partitions: Vec::new(),
            queue: VecDeque::new(),
            queued: BTreeSet::new(),
            placed: vec![false; graph.pins.len()],
            networks: graph.networks(),
            box_keys,
            mates,
            steps: 0,
        };
        processor.seed();
        Ok(processor)
    }

    fn seed(&mut self) {
        let graph = self.graph;
        for bx in &graph.boxes {
            let real_count = self.mates.get(&bx.box_id).map_or(0, Vec::len);
            if real_count < self.options.min_seed_pins {
                continue;
            }
            let mut sides: BTreeMap<Side, Vec<usize>> = BTreeMap::new();
            for (i, pin) in graph.pins.iter().enumerate() {
                if pin.box_id != bx.box_id {
                    continue;
                }
                if let Some(side) = pin_direction(graph, pin) {
                    sides.entry(side).or_default().push(i);
                }
            }
            for (side, pins) in sides {
                let id = self.partitions.len();
                self.partitions.push(Partition::seeded(id, bx.box_id.clone(), side));
                for pin in pins {
                    self.enqueue(pin, id);
                }
            }
        }
        tracing::debug!("Seeded {} partition(s)", self.partitions.len());
    }

    fn enqueue(&mut self, pin: usize, partition: usize) {
        if self.queued.insert((pin, partition)) {
            self.queue.push_back((pin, partition));
        }
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Partitions in their current (possibly unfinished) state. Their
    /// `graph` is only filled by [`finish`](Self::finish).
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Process one work item; `None` once the queue is empty.
    pub fn step(&mut self) -> Option<StepOutcome> {
        let (pin_idx, part_idx) = self.queue.pop_front()?;
        self.steps += 1;

        let graph = self.graph;
        let pin = &graph.pins[pin_idx];
        let key = pin.key();
        let duplicable = self.options.duplicable_colors.contains(&pin.color);

        if (self.placed[pin_idx] && !duplicable) || self.partitions[part_idx].pins.contains(&key) {
            return Some(StepOutcome::Discarded {
                pin: key,
                partition: part_idx,
            });
        }

        let roles = self.box_keys.get(&pin.box_id).cloned().unwrap_or_default();
        let partition = &self.partitions[part_idx];
        for role in &roles {
            if let Some(holder) = partition.reserved_keys.get(role) {
                if holder != &pin.box_id {
                    tracing::trace!("{} rejected from partition {}: {} held by {}", key, part_idx, role, holder);
                    return Some(StepOutcome::Rejected {
                        pin: key,
                        partition: part_idx,
                        key: role.clone(),
                        holder: holder.clone(),
                    });
                }
            }
        }

        let partition = &mut self.partitions[part_idx];
        partition.pins.insert(key.clone());
        partition.boxes.insert(pin.box_id.clone());
        for role in roles {
            partition.reserved_keys.insert(role, pin.box_id.clone());
        }
        self.placed[pin_idx] = true;

        let network_mates = self.networks.get(&pin.network_id).cloned().unwrap_or_default();
        for other in network_mates {
            if other != pin_idx {
                self.enqueue(other, part_idx);
            }
        }
        if let Some(real) = self.mates.get(&pin.box_id).cloned() {
            if real.len() == 2 {
                for other in real {
                    if other != pin_idx {
                        self.enqueue(other, part_idx);
                    }
                }
            }
        }

        Some(StepOutcome::Accepted {
            pin: key,
            partition: part_idx,
        })
    }

    /// Step until the queue drains, failing once `max_iterations` steps
    /// were spent with work left.
    pub fn run(mut self) -> Result<Vec<Partition>> {
        while !self.is_done() {
            if self.steps >= self.options.max_iterations {
                return Err(SchemalignError::IterationLimit {
                    limit: self.options.max_iterations,
                });
            }
            self.step();
        }
        Ok(self.finish())
    }

    /// Build each partition's graph from what was accepted so far.
    pub fn finish(self) -> Vec<Partition> {
        let graph = self.graph;
        let duplicable = &self.options.duplicable_colors;
        self.partitions
            .into_iter()
            .map(|mut partition| {
                partition.graph = BpcGraph {
                    boxes: graph
                        .boxes
                        .iter()
                        .filter(|b| partition.boxes.contains(&b.box_id))
                        .cloned()
                        .collect(),
                    pins: graph
                        .pins
                        .iter()
                        .filter(|p| {
                            partition.pins.contains(&p.key())
                                || (partition.boxes.contains(&p.box_id) && duplicable.contains(&p.color))
                        })
                        .cloned()
                        .collect(),
                };
                partition
            })
            .collect()
    }

    /// Pins no partition accepted
    pub fn unplaced(&self) -> Vec<PinKey> {
        self.graph
            .pins
            .iter()
            .zip(&self.placed)
            .filter(|(_, &placed)| !placed)
            .map(|(p, _)| p.key())
            .collect()
    }
}

/// Run the partitioner to completion.
pub fn partition_graph(graph: &BpcGraph, options: &PartitionOptions) -> Result<Vec<Partition>> {
    let partitions = SchematicPartitionProcessor::new(graph, options.clone())?.run()?;
    tracing::info!("Partitioned {} boxes into {} partition(s)", graph.boxes.len(), partitions.len());
    Ok(partitions)
}
