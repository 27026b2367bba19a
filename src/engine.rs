//! Engine: the boundary between the control path and the audio callback
//!
//! All structural edits, the re-sort they trigger and the audio callback's
//! per-buffer processing run under one `parking_lot::Mutex`. The lock is
//! short-held on both sides: storage is reserved up front from
//! [`EngineConfig`], so an edit does bounded work while holding it, and the
//! callback holds it for one device period. This is a fixed-priority trade:
//! the audio thread may wait for an in-flight edit to finish, but never for
//! anything unbounded.
//!
//! Inspection calls (`view_block`, `get_wires_to_block`, ...) never take the
//! lock. They read an immutable [`GraphSnapshot`] republished after every
//! successful edit, so a reader racing an edit may see the graph as it was
//! one edit earlier. That staleness is part of the contract. Calls that
//! touch live slot values (`view_block_io`, `slot_value`, `set_input_*`)
//! take the lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use slotmap::SlotMap;
use tracing::{debug, trace, warn};

use crate::block::{AudioContext, BlockDescriptor, BlockRecord};
use crate::config::EngineConfig;
use crate::error::{ConfigError, Entity, GraphError};
use crate::graph::{BlockIoView, Graph};
use crate::slot::{SlotShape, SlotValue, Width};
use crate::store::{BlockHandle, SlotHandle, WireHandle};
use crate::wire::{Adapter, WireRecord};

/// Immutable copy of every block and wire record
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    blocks: SlotMap<BlockHandle, BlockRecord>,
    wires: SlotMap<WireHandle, WireRecord>,
    order: Vec<BlockHandle>,
}

impl GraphSnapshot {
    fn capture(graph: &Graph) -> Self {
        Self {
            blocks: graph.store().blocks.clone(),
            wires: graph.store().wires.clone(),
            order: graph.execution_order().to_vec(),
        }
    }

    pub fn block(&self, handle: BlockHandle) -> Option<&BlockRecord> {
        self.blocks.get(handle)
    }

    pub fn wire(&self, handle: WireHandle) -> Option<&WireRecord> {
        self.wires.get(handle)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockHandle, &BlockRecord)> {
        self.blocks.iter()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireHandle, &WireRecord)> {
        self.wires.iter()
    }

    pub fn execution_order(&self) -> &[BlockHandle] {
        &self.order
    }

    fn wires_where(&self, pred: impl Fn(&WireRecord) -> bool) -> Vec<WireHandle> {
        self.wires
            .iter()
            .filter(|(_, w)| pred(w))
            .map(|(h, _)| h)
            .collect()
    }
}

/// The slot read by the device callback, and how many channels it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRef {
    pub slot: SlotHandle,
    pub width: usize,
}

struct Shared {
    graph: Graph,
    ctx: AudioContext,
    output: Option<OutputRef>,
}

/// Thread-safe patch graph driven by a pull-based audio callback
pub struct Engine {
    config: EngineConfig,
    shared: Mutex<Shared>,
    snapshot: ArcSwap<GraphSnapshot>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let graph = Graph::with_capacity(config.max_slots, config.max_blocks, config.max_wires);
        let snapshot = GraphSnapshot::capture(&graph);
        debug!(
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "engine created"
        );
        Ok(Self {
            shared: Mutex::new(Shared {
                graph,
                ctx: AudioContext::new(config.sample_rate as f32),
                output: None,
            }),
            snapshot: ArcSwap::from_pointee(snapshot),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a graph edit under the lock and republish the snapshot on success
    fn edit<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Shared) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let mut shared = self.shared.lock();
        let result = f(&mut *shared);
        match &result {
            Ok(_) => self
                .snapshot
                .store(Arc::new(GraphSnapshot::capture(&shared.graph))),
            Err(err) => warn!(op, %err, "graph edit rejected"),
        }
        result
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    pub fn add_block(&self, descriptor: &BlockDescriptor) -> Result<BlockHandle, GraphError> {
        let handle = self.edit("add_block", |s| s.graph.add_block(descriptor))?;
        debug!(?handle, kind = ?descriptor.kind, "block added");
        Ok(handle)
    }

    /// Remove a block and every wire touching it. If the block owned the
    /// registered output slot, the output is cleared.
    pub fn remove_block(&self, handle: BlockHandle) -> Result<(), GraphError> {
        self.edit("remove_block", |s| {
            let owns_output = match s.output {
                Some(out) => s.graph.store().slot(out.slot).map(|slot| slot.owner) == Ok(handle),
                None => false,
            };
            s.graph.remove_block(handle)?;
            if owns_output {
                s.output = None;
            }
            Ok(())
        })?;
        debug!(?handle, "block removed");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn connect_wire(
        &self,
        src_block: BlockHandle,
        src_output: usize,
        dst_block: BlockHandle,
        dst_input: usize,
        adapter: Adapter,
        gain: f32,
        offset: f32,
    ) -> Result<WireHandle, GraphError> {
        let wire = self.edit("connect_wire", |s| {
            s.graph
                .connect(src_block, src_output, dst_block, dst_input, adapter, gain, offset)
        })?;
        debug!(?wire, ?adapter, "wire connected");
        Ok(wire)
    }

    /// Connect with unit gain and zero offset
    pub fn connect(
        &self,
        src_block: BlockHandle,
        src_output: usize,
        dst_block: BlockHandle,
        dst_input: usize,
        adapter: Adapter,
    ) -> Result<WireHandle, GraphError> {
        self.connect_wire(src_block, src_output, dst_block, dst_input, adapter, 1.0, 0.0)
    }

    /// Connect into lane `lane` of a mixer's input
    #[allow(clippy::too_many_arguments)]
    pub fn connect_to_mixer(
        &self,
        src_block: BlockHandle,
        src_output: usize,
        mixer: BlockHandle,
        lane: usize,
        adapter: Adapter,
        gain: f32,
        offset: f32,
    ) -> Result<WireHandle, GraphError> {
        let wire = self.edit("connect_to_mixer", |s| {
            s.graph
                .connect_to_mixer(src_block, src_output, mixer, lane, adapter, gain, offset)
        })?;
        debug!(?wire, lane, ?adapter, "mixer wire connected");
        Ok(wire)
    }

    pub fn disconnect_wire(&self, wire: WireHandle) -> Result<(), GraphError> {
        self.edit("disconnect_wire", |s| s.graph.disconnect(wire))?;
        debug!(?wire, "wire disconnected");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameter edits (no re-sort)
    // ------------------------------------------------------------------

    pub fn tweak_gain(&self, wire: WireHandle, gain: f32) -> Result<(), GraphError> {
        self.edit("tweak_gain", |s| s.graph.tweak_gain(wire, gain))?;
        trace!(?wire, gain, "gain tweaked");
        Ok(())
    }

    pub fn tweak_offset(&self, wire: WireHandle, offset: f32) -> Result<(), GraphError> {
        self.edit("tweak_offset", |s| s.graph.tweak_offset(wire, offset))?;
        trace!(?wire, offset, "offset tweaked");
        Ok(())
    }

    pub fn set_input_scalar(&self, slot: SlotHandle, value: f32) -> Result<(), GraphError> {
        self.shared.lock().graph.set_input_scalar(slot, value)
    }

    pub fn set_input_lanes(&self, slot: SlotHandle, values: &[f32]) -> Result<(), GraphError> {
        self.shared.lock().graph.set_input_lanes(slot, values)
    }

    /// Register the slot read by the device callback. `width` 1 takes a
    /// scalar slot, duplicated to both channels; `width` 2 takes a stereo
    /// pair.
    pub fn set_output(&self, slot: SlotHandle, width: usize) -> Result<(), GraphError> {
        let mut shared = self.shared.lock();
        let shape = shared.graph.store().slot(slot)?.shape();
        let expected = match width {
            1 => Some(SlotShape::Scalar),
            2 => Some(SlotShape::Vector(Width::W2)),
            _ => None,
        };
        if expected != Some(shape) {
            warn!(width, ?shape, "output slot rejected");
            return Err(GraphError::ShapeMismatch {
                from: shape,
                to: expected.unwrap_or(shape),
            });
        }
        shared.output = Some(OutputRef { slot, width });
        debug!(?slot, width, "output registered");
        Ok(())
    }

    pub fn clear_output(&self) {
        self.shared.lock().output = None;
    }

    pub fn get_output_ref(&self) -> Option<OutputRef> {
        self.shared.lock().output
    }

    // ------------------------------------------------------------------
    // Locked inspection of live slot values
    // ------------------------------------------------------------------

    pub fn view_block_io(&self, block: BlockHandle) -> Result<BlockIoView, GraphError> {
        self.shared.lock().graph.view_block_io(block)
    }

    pub fn slot_value(&self, slot: SlotHandle) -> Result<SlotValue, GraphError> {
        self.shared.lock().graph.slot_value(slot)
    }

    // ------------------------------------------------------------------
    // Lock-free inspection, best-effort consistent
    // ------------------------------------------------------------------

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshot.load_full()
    }

    pub fn view_block(&self, block: BlockHandle) -> Result<BlockRecord, GraphError> {
        self.snapshot
            .load()
            .block(block)
            .cloned()
            .ok_or(GraphError::NotFound(Entity::Block))
    }

    pub fn view_wire(&self, wire: WireHandle) -> Result<WireRecord, GraphError> {
        self.snapshot
            .load()
            .wire(wire)
            .copied()
            .ok_or(GraphError::NotFound(Entity::Wire))
    }

    pub fn get_blocks(&self) -> Vec<(BlockHandle, BlockRecord)> {
        self.snapshot
            .load()
            .blocks()
            .map(|(h, b)| (h, b.clone()))
            .collect()
    }

    pub fn get_wires_to_block(&self, block: BlockHandle) -> Vec<WireHandle> {
        self.snapshot.load().wires_where(|w| w.to_block == block)
    }

    pub fn get_wires_from_block(&self, block: BlockHandle) -> Vec<WireHandle> {
        self.snapshot.load().wires_where(|w| w.from_block == block)
    }

    /// The wire driving input `input` of `block`, addressed the way
    /// `connect_wire` addresses it (a lane for mixer wires)
    pub fn get_wire_to_input(&self, block: BlockHandle, input: usize) -> Option<WireHandle> {
        self.snapshot
            .load()
            .wires_where(|w| w.to_block == block && w.to_input == input)
            .first()
            .copied()
    }

    pub fn get_wires_from_output(&self, block: BlockHandle, output: usize) -> Vec<WireHandle> {
        self.snapshot
            .load()
            .wires_where(|w| w.from_block == block && w.from_output == output)
    }

    pub fn execution_order(&self) -> Vec<BlockHandle> {
        self.snapshot.load().execution_order().to_vec()
    }

    // ------------------------------------------------------------------
    // Audio path
    // ------------------------------------------------------------------

    /// Elapsed engine time in seconds
    pub fn clock(&self) -> f64 {
        self.shared.lock().ctx.clock
    }

    pub fn reset_clock(&self) {
        self.shared.lock().ctx.clock = 0.0;
    }

    /// Process one sample and return the output frame
    pub fn tick(&self) -> (f32, f32) {
        let mut shared = self.shared.lock();
        let Shared { graph, ctx, output } = &mut *shared;
        ctx.advance();
        graph.process(ctx);
        read_output(graph, *output)
    }

    /// Device callback: fill `out` with interleaved stereo frames, running
    /// the graph once per frame. A trailing odd sample is zeroed.
    pub fn render(&self, out: &mut [f32]) {
        let mut shared = self.shared.lock();
        let Shared { graph, ctx, output } = &mut *shared;

        let mut frames = out.chunks_exact_mut(2);
        for frame in &mut frames {
            ctx.advance();
            graph.process(ctx);
            let (left, right) = read_output(graph, *output);
            frame[0] = left;
            frame[1] = right;
        }
        frames.into_remainder().fill(0.0);
    }
}

fn read_output(graph: &Graph, output: Option<OutputRef>) -> (f32, f32) {
    let Some(output) = output else {
        return (0.0, 0.0);
    };
    match graph.store().slot(output.slot).map(|s| &s.value) {
        Ok(SlotValue::Scalar(v)) => (*v, *v),
        Ok(SlotValue::Vector(lanes)) => (
            lanes.get(0).unwrap_or(0.0),
            lanes.get(1).unwrap_or(0.0),
        ),
        _ => (0.0, 0.0),
    }
}
