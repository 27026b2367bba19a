//! Block Records
//!
//! A block is a graph node that runs one processing callback per sample. It
//! owns up to 8 input and 4 output slots, created together when the block is
//! added and released when it is removed.

use core::fmt;

use slotmap::SlotMap;

use crate::error::{GraphError, Limit};
use crate::slot::{Lanes, Slot, SlotSpec, SlotValue, Width};
use crate::store::{SlotHandle, WireHandle};

pub const MAX_INPUTS: usize = 8;
pub const MAX_OUTPUTS: usize = 4;

/// Wires that may feed a single block at once
pub const INBOUND_CAPACITY: usize = 16;

/// Per-sample timing handed to every processing callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioContext {
    pub sample_rate: f32,
    /// Seconds per sample
    pub dt: f32,
    /// Elapsed time in seconds
    pub clock: f64,
}

impl AudioContext {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            dt: 1.0 / sample_rate,
            clock: 0.0,
        }
    }

    /// Step the clock forward by one sample
    pub fn advance(&mut self) {
        self.clock += f64::from(self.dt);
    }
}

/// Type tag of a block
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Constant,
    Affine,
    Sum,
    Product,
    SineOsc,
    MonoMixer(Width),
    StereoMixer(Width),
    /// A block implemented outside the built-in catalog
    Custom(&'static str),
}

/// Processing callback: reads the block's inputs and writes its outputs
pub type ProcessFn = fn(&mut BlockIo<'_>, &AudioContext);

/// Everything needed to instantiate a block
#[derive(Clone)]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    pub inputs: Vec<SlotSpec>,
    pub outputs: Vec<SlotSpec>,
    pub process: ProcessFn,
}

impl BlockDescriptor {
    pub fn new(kind: BlockKind, process: ProcessFn) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            process,
        }
    }

    pub fn with_input(mut self, spec: SlotSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn with_output(mut self, spec: SlotSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub(crate) fn check_limits(&self) -> Result<(), GraphError> {
        if self.inputs.len() > MAX_INPUTS {
            return Err(GraphError::CapacityExceeded(Limit::Inputs));
        }
        if self.outputs.len() > MAX_OUTPUTS {
            return Err(GraphError::CapacityExceeded(Limit::Outputs));
        }
        Ok(())
    }
}

impl fmt::Debug for BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Bounded, allocation-free list of the wires feeding one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundWires {
    wires: [WireHandle; INBOUND_CAPACITY],
    len: usize,
}

impl InboundWires {
    pub fn new() -> Self {
        Self {
            wires: [WireHandle::default(); INBOUND_CAPACITY],
            len: 0,
        }
    }

    pub fn as_slice(&self) -> &[WireHandle] {
        &self.wires[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == INBOUND_CAPACITY
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn push(&mut self, wire: WireHandle) -> Result<(), GraphError> {
        if self.is_full() {
            return Err(GraphError::CapacityExceeded(Limit::InboundWires));
        }
        self.wires[self.len] = wire;
        self.len += 1;
        Ok(())
    }
}

impl Default for InboundWires {
    fn default() -> Self {
        Self::new()
    }
}

/// A live block record in the store
#[derive(Clone)]
pub struct BlockRecord {
    pub kind: BlockKind,
    pub inputs: [Option<SlotHandle>; MAX_INPUTS],
    pub outputs: [Option<SlotHandle>; MAX_OUTPUTS],
    /// Position in the schedule assigned by the last successful sort
    pub topo_index: u32,
    pub(crate) inbound: InboundWires,
    pub(crate) process: ProcessFn,
}

impl BlockRecord {
    pub fn input(&self, index: usize) -> Option<SlotHandle> {
        self.inputs.get(index).copied().flatten()
    }

    pub fn output(&self, index: usize) -> Option<SlotHandle> {
        self.outputs.get(index).copied().flatten()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.iter().flatten().count()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.iter().flatten().count()
    }

    /// Wires feeding this block, as of the last sort
    pub fn inbound(&self) -> &[WireHandle] {
        self.inbound.as_slice()
    }

    /// Every slot owned by this block, inputs first
    pub fn slots(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).flatten().copied()
    }
}

impl fmt::Debug for BlockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRecord")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("topo_index", &self.topo_index)
            .field("inbound", &self.inbound.as_slice())
            .finish_non_exhaustive()
    }
}

/// A block's view of its own slots during processing.
///
/// Only slots listed in the block record are reachable, so a callback cannot
/// touch any other part of the graph. Missing or mis-shaped slots read as
/// zero and ignore writes.
pub struct BlockIo<'a> {
    slots: &'a mut SlotMap<SlotHandle, Slot>,
    block: &'a BlockRecord,
}

impl<'a> BlockIo<'a> {
    pub(crate) fn new(slots: &'a mut SlotMap<SlotHandle, Slot>, block: &'a BlockRecord) -> Self {
        Self { slots, block }
    }

    fn input_value(&self, index: usize) -> Option<&SlotValue> {
        let handle = self.block.input(index)?;
        self.slots.get(handle).map(|s| &s.value)
    }

    fn input_value_mut(&mut self, index: usize) -> Option<&mut SlotValue> {
        let handle = self.block.input(index)?;
        self.slots.get_mut(handle).map(|s| &mut s.value)
    }

    fn output_value_mut(&mut self, index: usize) -> Option<&mut SlotValue> {
        let handle = self.block.output(index)?;
        self.slots.get_mut(handle).map(|s| &mut s.value)
    }

    /// Scalar input value
    pub fn scalar(&self, index: usize) -> f32 {
        self.input_value(index)
            .and_then(SlotValue::as_scalar)
            .unwrap_or(0.0)
    }

    pub fn lanes(&self, index: usize) -> Option<&Lanes> {
        self.input_value(index).and_then(SlotValue::as_lanes)
    }

    pub fn stereo(&self, index: usize) -> Option<(&Lanes, &Lanes)> {
        self.input_value(index).and_then(SlotValue::as_stereo)
    }

    /// Write back into one of the block's own scalar inputs. Oscillators
    /// keep their phase this way.
    pub fn store_scalar_input(&mut self, index: usize, value: f32) {
        if let Some(SlotValue::Scalar(v)) = self.input_value_mut(index) {
            *v = value;
        }
    }

    pub fn set_scalar(&mut self, index: usize, value: f32) {
        if let Some(SlotValue::Scalar(v)) = self.output_value_mut(index) {
            *v = value;
        }
    }

    /// Write a stereo pair into a two-lane vector output
    pub fn set_pair(&mut self, index: usize, left: f32, right: f32) {
        if let Some(lanes) = self.output_value_mut(index).and_then(SlotValue::as_lanes_mut) {
            if let [l, r, ..] = lanes.as_mut_slice() {
                *l = left;
                *r = right;
            }
        }
    }

    pub fn lanes_mut(&mut self, index: usize) -> Option<&mut Lanes> {
        self.output_value_mut(index).and_then(SlotValue::as_lanes_mut)
    }
}
