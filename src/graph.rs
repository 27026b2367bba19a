//! Patch Graph
//!
//! Owns the record store and the scheduler and applies structural edits.
//! Every successful structural edit re-sorts before returning, so the cached
//! schedule always reflects the current topology by the time the audio path
//! runs again. A rejected edit leaves the graph exactly as it was.
//!
//! This type is single-threaded; [`Engine`](crate::engine::Engine) wraps it
//! in the lock shared with the audio callback.

use crate::block::{
    AudioContext, BlockDescriptor, BlockIo, BlockRecord, InboundWires, MAX_INPUTS, MAX_OUTPUTS,
};
use crate::error::{Entity, GraphError, Limit};
use crate::scheduler::Scheduler;
use crate::slot::{Direction, Lanes, Slot, SlotSpec, SlotValue};
use crate::store::{BlockHandle, SlotHandle, Store, WireHandle};
use crate::wire::{Adapter, WireRecord};

/// Copies of a block's slot values, in slot order
#[derive(Debug, Clone, PartialEq)]
pub struct BlockIoView {
    pub inputs: Vec<(SlotHandle, Slot)>,
    pub outputs: Vec<(SlotHandle, Slot)>,
}

/// A mutable DAG of blocks connected by wires
#[derive(Debug, Clone, Default)]
pub struct Graph {
    store: Store,
    scheduler: Scheduler,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with arenas and scheduler scratch reserved up front
    pub fn with_capacity(slots: usize, blocks: usize, wires: usize) -> Self {
        Self {
            store: Store::with_capacity(slots, blocks, wires),
            scheduler: Scheduler::with_capacity(blocks, wires),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Blocks in execution order
    pub fn execution_order(&self) -> &[BlockHandle] {
        self.scheduler.order()
    }

    /// Wires grouped by the schedule position of their destination
    pub fn wire_order(&self) -> &[WireHandle] {
        self.scheduler.wire_order()
    }

    /// Allocate the descriptor's slots, register the block and re-sort
    pub fn add_block(&mut self, descriptor: &BlockDescriptor) -> Result<BlockHandle, GraphError> {
        descriptor.check_limits()?;

        let Store { slots, blocks, .. } = &mut self.store;
        let handle = blocks.insert_with_key(|owner| {
            let mut inputs = [None; MAX_INPUTS];
            let mut outputs = [None; MAX_OUTPUTS];
            let mut alloc = |spec: &SlotSpec, direction| {
                Some(slots.insert(Slot {
                    owner,
                    direction,
                    tag: spec.tag,
                    value: spec.initial,
                }))
            };
            for (slot, spec) in inputs.iter_mut().zip(&descriptor.inputs) {
                *slot = alloc(spec, Direction::Input);
            }
            for (slot, spec) in outputs.iter_mut().zip(&descriptor.outputs) {
                *slot = alloc(spec, Direction::Output);
            }
            BlockRecord {
                kind: descriptor.kind,
                inputs,
                outputs,
                topo_index: 0,
                inbound: InboundWires::new(),
                process: descriptor.process,
            }
        });

        self.scheduler.toposort(&mut self.store)?;
        Ok(handle)
    }

    /// Remove every wire touching the block, release its slots, remove it and
    /// re-sort
    pub fn remove_block(&mut self, handle: BlockHandle) -> Result<(), GraphError> {
        self.store.block(handle)?;

        let touching: Vec<WireHandle> = self
            .store
            .wires
            .iter()
            .filter(|(_, w)| w.from_block == handle || w.to_block == handle)
            .map(|(h, _)| h)
            .collect();
        for wire in touching {
            self.detach_wire(wire);
        }

        if let Some(record) = self.store.blocks.remove(handle) {
            for slot in record.slots() {
                self.store.slots.remove(slot);
            }
        }

        self.scheduler.toposort(&mut self.store)
    }

    /// Connect `src_output` of `src_block` to `dst_input` of `dst_block`.
    ///
    /// For the lane-scatter adapters `dst_input` is the lane of the mixer's
    /// first input slot.
    #[allow(clippy::too_many_arguments)]
    pub fn connect(
        &mut self,
        src_block: BlockHandle,
        src_output: usize,
        dst_block: BlockHandle,
        dst_input: usize,
        adapter: Adapter,
        gain: f32,
        offset: f32,
    ) -> Result<WireHandle, GraphError> {
        let source = self
            .store
            .block(src_block)?
            .output(src_output)
            .ok_or(GraphError::NotFound(Entity::Port))?;
        let dst = self.store.block(dst_block)?;
        let (target, lane) = if adapter.is_lane_scatter() {
            (dst.input(0), Some(dst_input))
        } else {
            (dst.input(dst_input), None)
        };
        let target = target.ok_or(GraphError::NotFound(Entity::Port))?;

        let from_shape = self.store.slot(source)?.shape();
        let saved = self.store.slot(target)?.value;
        adapter.check(from_shape, saved.shape(), lane.unwrap_or(0))?;

        let already_driven = dst
            .inbound()
            .iter()
            .filter_map(|&w| self.store.wires.get(w))
            .any(|w| w.drives(target, lane));
        if already_driven {
            return Err(GraphError::InputAlreadyConnected);
        }
        if dst.inbound.is_full() {
            return Err(GraphError::CapacityExceeded(Limit::InboundWires));
        }

        let wire = self.store.wires.insert(WireRecord {
            from_block: src_block,
            from_output: src_output,
            to_block: dst_block,
            to_input: dst_input,
            gain,
            offset,
            adapter,
            source,
            target,
            saved,
        });

        match self.scheduler.toposort(&mut self.store) {
            Ok(()) => Ok(wire),
            Err(err) => {
                self.store.wires.remove(wire);
                Err(err)
            }
        }
    }

    /// Connect a source output to lane `lane` of a mixer's input
    #[allow(clippy::too_many_arguments)]
    pub fn connect_to_mixer(
        &mut self,
        src_block: BlockHandle,
        src_output: usize,
        mixer: BlockHandle,
        lane: usize,
        adapter: Adapter,
        gain: f32,
        offset: f32,
    ) -> Result<WireHandle, GraphError> {
        if !adapter.is_lane_scatter() {
            let from = self
                .store
                .block(src_block)?
                .output(src_output)
                .and_then(|s| self.store.slots.get(s))
                .map(Slot::shape)
                .ok_or(GraphError::NotFound(Entity::Port))?;
            let to = self
                .store
                .block(mixer)?
                .input(0)
                .and_then(|s| self.store.slots.get(s))
                .map(Slot::shape)
                .ok_or(GraphError::NotFound(Entity::Port))?;
            return Err(GraphError::ShapeMismatch { from, to });
        }
        self.connect(src_block, src_output, mixer, lane, adapter, gain, offset)
    }

    /// Remove a wire, restore what it was overwriting and re-sort
    pub fn disconnect(&mut self, wire: WireHandle) -> Result<(), GraphError> {
        self.store.wire(wire)?;
        self.detach_wire(wire);
        self.scheduler.toposort(&mut self.store)
    }

    fn detach_wire(&mut self, wire: WireHandle) {
        if let Some(record) = self.store.wires.remove(wire) {
            if let Some(slot) = self.store.slots.get_mut(record.target) {
                record
                    .adapter
                    .restore(&record.saved, &mut slot.value, record.lane_or_zero());
            }
        }
    }

    pub fn tweak_gain(&mut self, wire: WireHandle, gain: f32) -> Result<(), GraphError> {
        self.store.wire_mut(wire)?.gain = gain;
        Ok(())
    }

    pub fn tweak_offset(&mut self, wire: WireHandle, offset: f32) -> Result<(), GraphError> {
        self.store.wire_mut(wire)?.offset = offset;
        Ok(())
    }

    /// Overwrite a scalar slot
    pub fn set_input_scalar(&mut self, slot: SlotHandle, value: f32) -> Result<(), GraphError> {
        let slot = self.store.slot_mut(slot)?;
        match &mut slot.value {
            SlotValue::Scalar(v) => {
                *v = value;
                Ok(())
            }
            other => Err(GraphError::ShapeMismatch {
                from: SlotValue::Scalar(value).shape(),
                to: other.shape(),
            }),
        }
    }

    /// Overwrite a vector slot; `values` must match its width
    pub fn set_input_lanes(&mut self, slot: SlotHandle, values: &[f32]) -> Result<(), GraphError> {
        let slot = self.store.slot_mut(slot)?;
        let to = slot.shape();
        match (Lanes::from_slice(values), &mut slot.value) {
            (Some(lanes), SlotValue::Vector(current)) if lanes.width() == current.width() => {
                *current = lanes;
                Ok(())
            }
            (Some(lanes), _) => Err(GraphError::ShapeMismatch {
                from: SlotValue::Vector(lanes).shape(),
                to,
            }),
            (None, _) => Err(GraphError::ShapeMismatch { from: to, to }),
        }
    }

    pub fn slot_value(&self, slot: SlotHandle) -> Result<SlotValue, GraphError> {
        Ok(self.store.slot(slot)?.value)
    }

    pub fn view_block_io(&self, block: BlockHandle) -> Result<BlockIoView, GraphError> {
        let record = self.store.block(block)?;
        let copy = |handles: &[Option<SlotHandle>]| {
            handles
                .iter()
                .flatten()
                .filter_map(|&h| self.store.slots.get(h).map(|s| (h, *s)))
                .collect()
        };
        Ok(BlockIoView {
            inputs: copy(&record.inputs),
            outputs: copy(&record.outputs),
        })
    }

    /// Run one sample: for each block in schedule order, pull its inbound
    /// wires and then run its processing callback.
    ///
    /// Allocation-free. Each block appears once in the schedule, so no block
    /// runs twice per call.
    pub fn process(&mut self, ctx: &AudioContext) {
        let Store {
            slots,
            blocks,
            wires,
        } = &mut self.store;

        for &handle in self.scheduler.order() {
            let Some(record) = blocks.get(handle) else {
                continue;
            };
            for &w in record.inbound() {
                let Some(wire) = wires.get(w) else {
                    continue;
                };
                let Some(src) = slots.get(wire.source).map(|s| s.value) else {
                    continue;
                };
                if let Some(dst) = slots.get_mut(wire.target) {
                    wire.adapter.transmit(
                        &src,
                        &mut dst.value,
                        wire.lane_or_zero(),
                        wire.gain,
                        wire.offset,
                    );
                }
            }
            let mut io = BlockIo::new(slots, record);
            (record.process)(&mut io, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;
    use crate::slot::{ParamName, SlotShape, Width};
    use approx::assert_relative_eq;

    fn output_scalar(graph: &Graph, block: BlockHandle) -> f32 {
        let slot = graph.store().block(block).unwrap().output(0).unwrap();
        graph.slot_value(slot).unwrap().as_scalar().unwrap()
    }

    fn input_slot(graph: &Graph, block: BlockHandle, index: usize) -> SlotHandle {
        graph.store().block(block).unwrap().input(index).unwrap()
    }

    fn wire(graph: &mut Graph, from: BlockHandle, to: BlockHandle) -> Result<WireHandle, GraphError> {
        graph.connect(from, 0, to, 0, Adapter::Direct, 1.0, 0.0)
    }

    #[test]
    fn test_add_block_allocates_slots() {
        let mut graph = Graph::new();
        let osc = graph.add_block(&blocks::sine_osc(440.0, 1.0)).unwrap();
        let record = graph.store().block(osc).unwrap();
        assert_eq!(record.input_count(), 3);
        assert_eq!(record.output_count(), 1);
        assert_eq!(graph.store().slot_count(), 4);
        assert_eq!(graph.execution_order(), &[osc]);

        let freq = graph.store().slot(record.input(1).unwrap()).unwrap();
        assert_eq!(freq.tag, ParamName::Freq);
        assert_eq!(freq.owner, osc);
    }

    #[test]
    fn test_chain_example() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::affine(2.0, 0.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 3.0)).unwrap();
        wire(&mut graph, a, b).unwrap();
        graph.set_input_scalar(input_slot(&graph, a, 0), 2.0).unwrap();

        graph.process(&AudioContext::new(48000.0));
        assert_relative_eq!(output_scalar(&graph, a), 4.0);
        assert_relative_eq!(output_scalar(&graph, b), 7.0);
    }

    #[test]
    fn test_order_independent_of_insertion() {
        let mut graph = Graph::new();
        // Sink added first so arena order disagrees with data flow
        let b = graph.add_block(&blocks::affine(1.0, 3.0)).unwrap();
        let a = graph.add_block(&blocks::affine(2.0, 0.0)).unwrap();
        wire(&mut graph, a, b).unwrap();
        graph.set_input_scalar(input_slot(&graph, a, 0), 2.0).unwrap();

        graph.process(&AudioContext::new(48000.0));
        assert_relative_eq!(output_scalar(&graph, b), 7.0);
        assert_eq!(graph.execution_order(), &[a, b]);
    }

    #[test]
    fn test_mono_mixer_example() {
        let mut graph = Graph::new();
        let doubler = graph.add_block(&blocks::affine(2.0, 0.0)).unwrap();
        let adder = graph.add_block(&blocks::affine(1.0, 3.0)).unwrap();
        let mixer = graph.add_block(&blocks::mono_mixer(Width::W4)).unwrap();
        graph.set_input_scalar(input_slot(&graph, doubler, 0), 3.0).unwrap();
        graph.set_input_scalar(input_slot(&graph, adder, 0), 2.0).unwrap();

        graph
            .connect_to_mixer(doubler, 0, mixer, 0, Adapter::MonoToMixerLane, 1.0, 0.0)
            .unwrap();
        graph
            .connect_to_mixer(adder, 0, mixer, 1, Adapter::MonoToMixerLane, 1.0, 0.0)
            .unwrap();

        graph.process(&AudioContext::new(48000.0));
        assert_relative_eq!(output_scalar(&graph, mixer), 11.0);
    }

    #[test]
    fn test_stereo_mixer_lanes() {
        let mut graph = Graph::new();
        let left = graph.add_block(&blocks::constant(0.5)).unwrap();
        let pan = graph.add_block(&blocks::stereo_mixer(Width::W2)).unwrap();
        let bus = graph.add_block(&blocks::stereo_mixer(Width::W4)).unwrap();

        graph
            .connect_to_mixer(left, 0, pan, 0, Adapter::MonoToStereoLane, 1.0, 0.0)
            .unwrap();
        graph
            .connect_to_mixer(pan, 0, bus, 3, Adapter::StereoToMixerLane, 2.0, 0.0)
            .unwrap();

        graph.process(&AudioContext::new(48000.0));
        let out = graph.store().block(bus).unwrap().output(0).unwrap();
        let value = graph.slot_value(out).unwrap();
        assert_eq!(value.as_lanes().unwrap().as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_cycle_rejected_and_rolled_back() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        wire(&mut graph, a, b).unwrap();
        let order = graph.execution_order().to_vec();

        for _ in 0..3 {
            assert_eq!(wire(&mut graph, b, a), Err(GraphError::CycleDetected));
            assert_eq!(graph.store().wire_count(), 1);
            assert_eq!(graph.execution_order(), order.as_slice());
            assert!(graph.store().block(a).unwrap().inbound().is_empty());
        }
    }

    #[test]
    fn test_input_already_connected() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let b = graph.add_block(&blocks::constant(2.0)).unwrap();
        let sink = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();

        let first = wire(&mut graph, a, sink).unwrap();
        assert_eq!(wire(&mut graph, b, sink), Err(GraphError::InputAlreadyConnected));

        graph.disconnect(first).unwrap();
        assert!(wire(&mut graph, b, sink).is_ok());
    }

    #[test]
    fn test_mixer_lane_conflicts() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let b = graph.add_block(&blocks::constant(2.0)).unwrap();
        let mixer = graph.add_block(&blocks::mono_mixer(Width::W4)).unwrap();

        graph
            .connect_to_mixer(a, 0, mixer, 2, Adapter::MonoToMixerLane, 1.0, 0.0)
            .unwrap();
        assert_eq!(
            graph.connect_to_mixer(b, 0, mixer, 2, Adapter::MonoToMixerLane, 1.0, 0.0),
            Err(GraphError::InputAlreadyConnected)
        );
        // A broadcast would overwrite every lane, including the driven one
        assert_eq!(
            graph.connect(b, 0, mixer, 0, Adapter::Broadcast, 1.0, 0.0),
            Err(GraphError::InputAlreadyConnected)
        );
        assert!(graph
            .connect_to_mixer(b, 0, mixer, 3, Adapter::MonoToMixerLane, 1.0, 0.0)
            .is_ok());
    }

    #[test]
    fn test_shape_mismatch() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let mixer = graph.add_block(&blocks::mono_mixer(Width::W4)).unwrap();

        assert_eq!(
            graph.connect(a, 0, mixer, 0, Adapter::Direct, 1.0, 0.0),
            Err(GraphError::ShapeMismatch {
                from: SlotShape::Scalar,
                to: SlotShape::Vector(Width::W4)
            })
        );
        assert!(matches!(
            graph.connect_to_mixer(a, 0, mixer, 4, Adapter::MonoToMixerLane, 1.0, 0.0),
            Err(GraphError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            graph.connect_to_mixer(a, 0, mixer, 0, Adapter::Direct, 1.0, 0.0),
            Err(GraphError::ShapeMismatch { .. })
        ));
        assert_eq!(graph.store().wire_count(), 0);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut graph = Graph::new();
        let mixer = graph.add_block(&blocks::mono_mixer(Width::W32)).unwrap();
        for lane in 0..16 {
            let src = graph.add_block(&blocks::constant(1.0)).unwrap();
            graph
                .connect_to_mixer(src, 0, mixer, lane, Adapter::MonoToMixerLane, 1.0, 0.0)
                .unwrap();
        }
        let extra = graph.add_block(&blocks::constant(1.0)).unwrap();
        assert_eq!(
            graph.connect_to_mixer(extra, 0, mixer, 16, Adapter::MonoToMixerLane, 1.0, 0.0),
            Err(GraphError::CapacityExceeded(Limit::InboundWires))
        );
        assert_eq!(graph.store().wire_count(), 16);

        graph.process(&AudioContext::new(48000.0));
        let out = graph.store().block(mixer).unwrap().output(0).unwrap();
        assert_relative_eq!(graph.slot_value(out).unwrap().as_scalar().unwrap(), 16.0);
    }

    #[test]
    fn test_unknown_ports() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        assert_eq!(
            graph.connect(a, 1, b, 0, Adapter::Direct, 1.0, 0.0),
            Err(GraphError::NotFound(Entity::Port))
        );
        assert_eq!(
            graph.connect(a, 0, b, 7, Adapter::Direct, 1.0, 0.0),
            Err(GraphError::NotFound(Entity::Port))
        );
    }

    #[test]
    fn test_disconnect_restores_previous_output() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(5.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 3.0)).unwrap();
        let ctx = AudioContext::new(48000.0);

        graph.process(&ctx);
        let before = output_scalar(&graph, b);
        assert_relative_eq!(before, 3.0);

        let w = wire(&mut graph, a, b).unwrap();
        graph.process(&ctx);
        assert_relative_eq!(output_scalar(&graph, b), 8.0);

        graph.disconnect(w).unwrap();
        graph.process(&ctx);
        assert_relative_eq!(output_scalar(&graph, b), before);
        assert_eq!(graph.disconnect(w), Err(GraphError::NotFound(Entity::Wire)));
    }

    #[test]
    fn test_tweaks_apply_without_resort() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(5.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        let w = wire(&mut graph, a, b).unwrap();
        let ctx = AudioContext::new(48000.0);

        graph.tweak_gain(w, 0.0).unwrap();
        graph.tweak_offset(w, 1.0).unwrap();
        graph.process(&ctx);
        assert_relative_eq!(output_scalar(&graph, b), 1.0);

        graph.tweak_gain(w, 1.0).unwrap();
        graph.tweak_offset(w, 0.0).unwrap();
        graph.process(&ctx);
        assert_relative_eq!(output_scalar(&graph, b), 5.0);
    }

    #[test]
    fn test_remove_block_removes_wires() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let b = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        let c = graph.add_block(&blocks::affine(1.0, 0.0)).unwrap();
        wire(&mut graph, a, b).unwrap();
        wire(&mut graph, b, c).unwrap();
        assert_eq!(graph.store().slot_count(), 10);

        graph.remove_block(b).unwrap();
        assert_eq!(graph.store().wire_count(), 0);
        assert_eq!(graph.store().block_count(), 2);
        assert_eq!(graph.store().slot_count(), 6);
        assert!(graph.store().block(a).unwrap().inbound().is_empty());
        assert!(graph.store().block(c).unwrap().inbound().is_empty());
        assert_eq!(graph.execution_order().len(), 2);

        assert_eq!(graph.remove_block(b), Err(GraphError::NotFound(Entity::Block)));
    }

    #[test]
    fn test_set_inputs_checks_shape() {
        let mut graph = Graph::new();
        let a = graph.add_block(&blocks::constant(1.0)).unwrap();
        let mixer = graph.add_block(&blocks::mono_mixer(Width::W2)).unwrap();
        let scalar = input_slot(&graph, a, 0);
        let lanes = input_slot(&graph, mixer, 0);

        assert!(graph.set_input_lanes(lanes, &[1.0, 2.0]).is_ok());
        assert!(graph.set_input_lanes(lanes, &[1.0, 2.0, 3.0, 4.0]).is_err());
        assert!(graph.set_input_lanes(scalar, &[1.0, 2.0]).is_err());
        assert!(graph.set_input_scalar(lanes, 1.0).is_err());

        graph.process(&AudioContext::new(48000.0));
        assert_relative_eq!(output_scalar(&graph, mixer), 3.0);
    }

    #[test]
    fn test_view_block_io_copies() {
        let mut graph = Graph::new();
        let osc = graph.add_block(&blocks::sine_osc(220.0, 0.5)).unwrap();
        let view = graph.view_block_io(osc).unwrap();
        assert_eq!(view.inputs.len(), 3);
        assert_eq!(view.outputs.len(), 1);
        assert_eq!(view.inputs[1].1.value, SlotValue::Scalar(220.0));
    }
}
