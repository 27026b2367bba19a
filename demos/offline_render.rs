//! Offline Render Example
//!
//! Builds a small stereo patch on the engine, renders one second of audio
//! the way a device callback would, then rewires it mid-stream.
//!
//! Run with: cargo run --example offline_render

use std::sync::Arc;

use patchgraph::prelude::*;

fn rms(buffer: &[f32]) -> f32 {
    (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
}

fn main() {
    let config = EngineConfig::from_json_str(r#"{ "sample_rate": 44100, "buffer_size": 256 }"#)
        .expect("valid config");
    let buffer_size = config.buffer_size as usize;
    let sample_rate = config.sample_rate;
    let engine = Arc::new(Engine::new(config).expect("engine"));

    // Two oscillators into a 4-lane stereo bus
    let bass = engine.add_block(&blocks::sine_osc(110.0, 0.4)).unwrap();
    let lead = engine.add_block(&blocks::sine_osc(440.0, 0.2)).unwrap();
    let bus = engine.add_block(&blocks::stereo_mixer(Width::W4)).unwrap();

    engine
        .connect_to_mixer(bass, 0, bus, 0, Adapter::MonoToStereoLane, 1.0, 0.0)
        .unwrap();
    let lead_wire = engine
        .connect_to_mixer(lead, 0, bus, 1, Adapter::MonoToStereoLane, 1.0, 0.0)
        .unwrap();

    // Slow LFO sweeping the lead's frequency around 440 Hz
    let lfo = engine.add_block(&blocks::sine_osc(2.0, 1.0)).unwrap();
    let depth = engine.add_block(&blocks::affine(20.0, 440.0)).unwrap();
    engine.connect(lfo, 0, depth, 0, Adapter::Direct).unwrap();
    engine.connect(depth, 0, lead, 1, Adapter::Direct).unwrap();

    let out = engine.view_block(bus).unwrap().output(0).unwrap();
    engine.set_output(out, 2).unwrap();

    println!("Execution order:");
    for block in engine.execution_order() {
        println!("  {:?}", engine.view_block(block).unwrap().kind);
    }

    // Render one second in device-sized periods
    let mut buffer = vec![0.0f32; buffer_size * 2];
    let periods = sample_rate as usize / buffer_size;
    for period in 0..periods {
        if period == periods / 2 {
            // Mute the lead halfway through
            engine.tweak_gain(lead_wire, 0.0).unwrap();
        }
        engine.render(&mut buffer);
        if period % 43 == 0 {
            println!(
                "t = {:.3}s  rms = {:.4}",
                engine.clock(),
                rms(&buffer)
            );
        }
    }

    engine.disconnect_wire(lead_wire).unwrap();
    println!(
        "Wires into bus after disconnect: {}",
        engine.get_wires_to_block(bus).len()
    );
}
