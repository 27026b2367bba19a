//! Record Store
//!
//! Generation-tagged arenas for slots, blocks and wires. A handle whose
//! record was removed fails lookup instead of aliasing whatever later reuses
//! the arena index. Iteration runs in arena order, so anything derived from
//! a walk over the store is deterministic.

use slotmap::{new_key_type, SlotMap};

use crate::block::BlockRecord;
use crate::error::{Entity, GraphError};
use crate::slot::Slot;
use crate::wire::WireRecord;

new_key_type! {
    /// Handle to an input or output slot
    pub struct SlotHandle;
    /// Handle to a block
    pub struct BlockHandle;
    /// Handle to a wire
    pub struct WireHandle;
}

/// Typed record storage backing a patch graph
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub(crate) slots: SlotMap<SlotHandle, Slot>,
    pub(crate) blocks: SlotMap<BlockHandle, BlockRecord>,
    pub(crate) wires: SlotMap<WireHandle, WireRecord>,
}

impl Store {
    pub fn with_capacity(slots: usize, blocks: usize, wires: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(slots),
            blocks: SlotMap::with_capacity_and_key(blocks),
            wires: SlotMap::with_capacity_and_key(wires),
        }
    }

    pub fn slot(&self, handle: SlotHandle) -> Result<&Slot, GraphError> {
        self.slots.get(handle).ok_or(GraphError::NotFound(Entity::Slot))
    }

    pub fn slot_mut(&mut self, handle: SlotHandle) -> Result<&mut Slot, GraphError> {
        self.slots
            .get_mut(handle)
            .ok_or(GraphError::NotFound(Entity::Slot))
    }

    pub fn block(&self, handle: BlockHandle) -> Result<&BlockRecord, GraphError> {
        self.blocks
            .get(handle)
            .ok_or(GraphError::NotFound(Entity::Block))
    }

    pub fn wire(&self, handle: WireHandle) -> Result<&WireRecord, GraphError> {
        self.wires.get(handle).ok_or(GraphError::NotFound(Entity::Wire))
    }

    pub fn wire_mut(&mut self, handle: WireHandle) -> Result<&mut WireRecord, GraphError> {
        self.wires
            .get_mut(handle)
            .ok_or(GraphError::NotFound(Entity::Wire))
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockHandle, &BlockRecord)> {
        self.blocks.iter()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireHandle, &WireRecord)> {
        self.wires.iter()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }
}
