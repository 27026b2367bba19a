//! Scheduler
//!
//! Computes a total execution order over blocks such that every wire's
//! source block runs before its destination. Sorting happens in two phases:
//! [`Scheduler::sort`] computes a candidate order into scratch state and can
//! fail, and only a successful sort is committed into the store (scheduling
//! indices, inbound-wire caches, wire ordering). A rejected edit therefore
//! never disturbs the schedule the audio path is running.

use slotmap::SecondaryMap;

use crate::block::INBOUND_CAPACITY;
use crate::error::{Entity, GraphError, Limit};
use crate::store::{BlockHandle, Store, WireHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Topological scheduler with reusable scratch buffers
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    order: Vec<BlockHandle>,
    wire_order: Vec<WireHandle>,

    // Scratch state
    marks: SecondaryMap<BlockHandle, Mark>,
    successors: SecondaryMap<BlockHandle, Vec<BlockHandle>>,
    inbound_counts: SecondaryMap<BlockHandle, usize>,
    stack: Vec<(BlockHandle, usize)>,
    postorder: Vec<BlockHandle>,
}

impl Scheduler {
    pub fn with_capacity(blocks: usize, wires: usize) -> Self {
        Self {
            order: Vec::with_capacity(blocks),
            wire_order: Vec::with_capacity(wires),
            marks: SecondaryMap::with_capacity(blocks),
            successors: SecondaryMap::with_capacity(blocks),
            inbound_counts: SecondaryMap::with_capacity(blocks),
            stack: Vec::with_capacity(blocks),
            postorder: Vec::with_capacity(blocks),
        }
    }

    /// Blocks in execution order, as of the last committed sort
    pub fn order(&self) -> &[BlockHandle] {
        &self.order
    }

    /// Wires grouped so that wires feeding earlier blocks come first
    pub fn wire_order(&self) -> &[WireHandle] {
        &self.wire_order
    }

    /// Sort and, on success, commit the new schedule into `store`.
    ///
    /// On failure the store and the previous schedule are left untouched.
    pub fn toposort(&mut self, store: &mut Store) -> Result<(), GraphError> {
        self.sort(store)?;
        self.commit(store);
        Ok(())
    }

    /// Compute a candidate order into `postorder` without touching the store.
    ///
    /// Iterative depth-first search with a three-state mark per block. Each
    /// block is pushed at most once, since only unvisited blocks are pushed
    /// and they are marked in-progress when pushed; reaching an in-progress
    /// block means the wire just followed closes a cycle.
    fn sort(&mut self, store: &Store) -> Result<(), GraphError> {
        self.marks.clear();
        self.stack.clear();
        self.postorder.clear();
        self.build_adjacency(store)?;

        for root in store.blocks.keys() {
            if self.marks.contains_key(root) {
                continue;
            }
            self.marks.insert(root, Mark::InProgress);
            self.stack.push((root, 0));

            while let Some(frame) = self.stack.last_mut() {
                let (node, cursor) = *frame;
                let next = self
                    .successors
                    .get(node)
                    .and_then(|succ| succ.get(cursor))
                    .copied();

                match next {
                    Some(next) => {
                        frame.1 += 1;
                        match self.marks.get(next).copied() {
                            None => {
                                self.marks.insert(next, Mark::InProgress);
                                self.stack.push((next, 0));
                            }
                            Some(Mark::InProgress) => {
                                self.stack.clear();
                                return Err(GraphError::CycleDetected);
                            }
                            Some(Mark::Done) => {}
                        }
                    }
                    None => {
                        self.stack.pop();
                        self.marks.insert(node, Mark::Done);
                        self.postorder.push(node);
                    }
                }
            }
        }

        Ok(())
    }

    fn build_adjacency(&mut self, store: &Store) -> Result<(), GraphError> {
        self.successors.clear();
        self.inbound_counts.clear();
        for block in store.blocks.keys() {
            self.successors.insert(block, Vec::new());
            self.inbound_counts.insert(block, 0);
        }

        for wire in store.wires.values() {
            let count = self
                .inbound_counts
                .get_mut(wire.to_block)
                .ok_or(GraphError::NotFound(Entity::Block))?;
            *count += 1;
            if *count > INBOUND_CAPACITY {
                return Err(GraphError::CapacityExceeded(Limit::InboundWires));
            }
            self.successors
                .get_mut(wire.from_block)
                .ok_or(GraphError::NotFound(Entity::Block))?
                .push(wire.to_block);
        }
        Ok(())
    }

    fn commit(&mut self, store: &mut Store) {
        self.order.clear();
        self.order.extend(self.postorder.iter().rev().copied());

        for (index, &block) in self.order.iter().enumerate() {
            if let Some(record) = store.blocks.get_mut(block) {
                record.topo_index = index as u32;
                record.inbound.clear();
            }
        }

        // Capacity was checked in `build_adjacency`, so pushes cannot fail.
        for (handle, wire) in store.wires.iter() {
            if let Some(record) = store.blocks.get_mut(wire.to_block) {
                let _ = record.inbound.push(handle);
            }
        }

        self.wire_order.clear();
        self.wire_order.extend(store.wires.keys());
        let blocks = &store.blocks;
        let wires = &store.wires;
        self.wire_order.sort_by_key(|&w| {
            wires
                .get(w)
                .and_then(|wire| blocks.get(wire.to_block))
                .map_or(u32::MAX, |b| b.topo_index)
        });
    }
}
