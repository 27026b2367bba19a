//! Property tests for graph editing and scheduling

use patchgraph::prelude::*;
use proptest::prelude::*;

/// (from block, to block, to input) over a pool of affine blocks
type Edit = (usize, usize, usize);

fn edits(blocks: usize) -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec((0..blocks, 0..blocks, 0..3usize), 0..40)
}

fn build(count: usize) -> (Graph, Vec<BlockHandle>) {
    let mut graph = Graph::new();
    let handles = (0..count)
        .map(|i| {
            graph
                .add_block(&blocks::affine(0.5 + i as f32 * 0.1, 0.25))
                .unwrap()
        })
        .collect();
    (graph, handles)
}

fn apply(graph: &mut Graph, handles: &[BlockHandle], edits: &[Edit]) -> Vec<Result<WireHandle, GraphError>> {
    edits
        .iter()
        .map(|&(from, to, input)| {
            graph.connect(handles[from], 0, handles[to], input, Adapter::Direct, 1.0, 0.0)
        })
        .collect()
}

/// Output bit patterns, so NaN compares equal to itself
fn outputs(graph: &Graph, handles: &[BlockHandle]) -> Vec<u32> {
    handles
        .iter()
        .map(|&b| {
            let slot = graph.store().block(b).unwrap().output(0).unwrap();
            graph.slot_value(slot).unwrap().as_scalar().unwrap().to_bits()
        })
        .collect()
}

fn wire_set(graph: &Graph) -> Vec<(WireHandle, WireRecord)> {
    graph.store().wires().map(|(h, w)| (h, *w)).collect()
}

proptest! {
    #[test]
    fn schedule_respects_every_wire(count in 2usize..10, edits in edits(10)) {
        let edits: Vec<Edit> = edits
            .into_iter()
            .filter(|&(from, to, _)| from < count && to < count)
            .collect();
        let (mut graph, handles) = build(count);
        apply(&mut graph, &handles, &edits);

        let order = graph.execution_order();
        prop_assert_eq!(order.len(), count);
        for &b in &handles {
            prop_assert_eq!(order.iter().filter(|&&x| x == b).count(), 1);
        }
        for (_, wire) in graph.store().wires() {
            let from = graph.store().block(wire.from_block).unwrap().topo_index;
            let to = graph.store().block(wire.to_block).unwrap().topo_index;
            prop_assert!(from < to);
        }

        let mut last = 0;
        for &w in graph.wire_order() {
            let to = graph.store().wire(w).unwrap().to_block;
            let index = graph.store().block(to).unwrap().topo_index;
            prop_assert!(index >= last);
            last = index;
        }
    }

    #[test]
    fn rejected_edits_change_nothing(count in 2usize..8, edits in edits(8)) {
        let (mut graph, handles) = build(count);
        for (from, to, input) in edits {
            if from >= count || to >= count {
                continue;
            }
            let wires = wire_set(&graph);
            let order = graph.execution_order().to_vec();
            let result = graph.connect(handles[from], 0, handles[to], input, Adapter::Direct, 1.0, 0.0);
            if result.is_err() {
                prop_assert_eq!(wire_set(&graph), wires);
                prop_assert_eq!(graph.execution_order(), order.as_slice());
            }
        }
    }

    #[test]
    fn identical_builds_process_identically(count in 2usize..8, edits in edits(8), samples in 1usize..32) {
        let edits: Vec<Edit> = edits
            .into_iter()
            .filter(|&(from, to, _)| from < count && to < count)
            .collect();
        let (mut a, ha) = build(count);
        let (mut b, hb) = build(count);
        let ra = apply(&mut a, &ha, &edits);
        let rb = apply(&mut b, &hb, &edits);
        prop_assert_eq!(ra, rb);
        prop_assert_eq!(a.execution_order(), b.execution_order());

        let ctx = AudioContext::new(48000.0);
        for _ in 0..samples {
            a.process(&ctx);
            b.process(&ctx);
        }
        prop_assert_eq!(outputs(&a, &ha), outputs(&b, &hb));
    }

    #[test]
    fn connect_then_disconnect_restores_inputs(
        count in 2usize..8,
        edits in edits(8),
        from in 0usize..8,
        to in 0usize..8,
        input in 0usize..3,
    ) {
        prop_assume!(from < count && to < count);
        let (mut graph, handles) = build(count);
        let edits: Vec<Edit> = edits
            .into_iter()
            .filter(|&(f, t, _)| f < count && t < count)
            .collect();
        apply(&mut graph, &handles, &edits);

        let target = graph.store().block(handles[to]).unwrap().input(input).unwrap();
        let before = graph.slot_value(target).unwrap();
        let order = graph.execution_order().to_vec();

        if let Ok(w) = graph.connect(handles[from], 0, handles[to], input, Adapter::Direct, 3.0, 1.0) {
            graph.process(&AudioContext::new(48000.0));
            graph.disconnect(w).unwrap();
            let after = graph.slot_value(target).unwrap().as_scalar().map(f32::to_bits);
            prop_assert_eq!(after, before.as_scalar().map(f32::to_bits));
            prop_assert_eq!(graph.execution_order().len(), order.len());
        }
    }
}
