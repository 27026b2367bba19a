//! Built-in Blocks
//!
//! A small catalog of block descriptors: sources, arithmetic and mixers.
//! Each constructor returns a [`BlockDescriptor`] with its slots' initial
//! values; the processing callbacks are plain functions over [`BlockIo`].
//!
//! Mixers take the lane count as a [`Width`], so one implementation serves
//! every supported width.

use core::f32::consts::TAU;

use libm::{floorf, sinf};

use crate::block::{AudioContext, BlockDescriptor, BlockIo, BlockKind};
use crate::slot::{ParamName, SlotSpec, Width};

/// Outputs its single input unchanged
pub fn constant(value: f32) -> BlockDescriptor {
    BlockDescriptor::new(BlockKind::Constant, process_constant)
        .with_input(SlotSpec::scalar(ParamName::Input, value))
        .with_output(SlotSpec::scalar(ParamName::Out, value))
}

fn process_constant(io: &mut BlockIo<'_>, _: &AudioContext) {
    let value = io.scalar(0);
    io.set_scalar(0, value);
}

/// `out = in * scale + offset`, with `scale` and `offset` as patchable inputs
///
/// Inputs: 0 `in`, 1 `scale`, 2 `offset`.
pub fn affine(scale: f32, offset: f32) -> BlockDescriptor {
    BlockDescriptor::new(BlockKind::Affine, process_affine)
        .with_input(SlotSpec::scalar(ParamName::Input, 0.0))
        .with_input(SlotSpec::scalar(ParamName::Amp, scale))
        .with_input(SlotSpec::scalar(ParamName::None, offset))
        .with_output(SlotSpec::scalar(ParamName::Out, offset))
}

fn process_affine(io: &mut BlockIo<'_>, _: &AudioContext) {
    let out = io.scalar(0) * io.scalar(1) + io.scalar(2);
    io.set_scalar(0, out);
}

/// Sum of four scalar inputs
pub fn sum() -> BlockDescriptor {
    (0..4)
        .fold(
            BlockDescriptor::new(BlockKind::Sum, process_sum),
            |desc, _| desc.with_input(SlotSpec::scalar(ParamName::Input, 0.0)),
        )
        .with_output(SlotSpec::scalar(ParamName::Out, 0.0))
}

fn process_sum(io: &mut BlockIo<'_>, _: &AudioContext) {
    let total = (0..4).map(|i| io.scalar(i)).sum();
    io.set_scalar(0, total);
}

/// Product of four scalar inputs, each defaulting to 1
pub fn product() -> BlockDescriptor {
    (0..4)
        .fold(
            BlockDescriptor::new(BlockKind::Product, process_product),
            |desc, _| desc.with_input(SlotSpec::scalar(ParamName::Input, 1.0)),
        )
        .with_output(SlotSpec::scalar(ParamName::Out, 1.0))
}

fn process_product(io: &mut BlockIo<'_>, _: &AudioContext) {
    let total = (0..4).map(|i| io.scalar(i)).product();
    io.set_scalar(0, total);
}

/// Sine oscillator
///
/// Inputs: 0 `phase` (cycles, kept in `[0, 1)`), 1 `freq` (Hz), 2 `amp`.
/// The phase input doubles as the oscillator's state and advances by
/// `freq * dt` every sample.
pub fn sine_osc(freq: f32, amp: f32) -> BlockDescriptor {
    BlockDescriptor::new(BlockKind::SineOsc, process_sine)
        .with_input(SlotSpec::scalar(ParamName::Phase, 0.0))
        .with_input(SlotSpec::scalar(ParamName::Freq, freq))
        .with_input(SlotSpec::scalar(ParamName::Amp, amp))
        .with_output(SlotSpec::scalar(ParamName::Out, 0.0))
}

fn process_sine(io: &mut BlockIo<'_>, ctx: &AudioContext) {
    let phase = io.scalar(0);
    let freq = io.scalar(1);
    let amp = io.scalar(2);

    io.set_scalar(0, amp * sinf(TAU * phase));

    let next = phase + freq * ctx.dt;
    io.store_scalar_input(0, next - floorf(next));
}

/// Sums an N-lane input into a scalar output. Feed it with
/// [`Adapter::MonoToMixerLane`](crate::wire::Adapter::MonoToMixerLane) wires.
pub fn mono_mixer(width: Width) -> BlockDescriptor {
    BlockDescriptor::new(BlockKind::MonoMixer(width), process_mono_mixer)
        .with_input(SlotSpec::vector(ParamName::Input, width))
        .with_output(SlotSpec::scalar(ParamName::Out, 0.0))
}

fn process_mono_mixer(io: &mut BlockIo<'_>, _: &AudioContext) {
    let total = io.lanes(0).map_or(0.0, |l| l.sum());
    io.set_scalar(0, total);
}

/// Sums an N-lane stereo input into a stereo pair output
pub fn stereo_mixer(width: Width) -> BlockDescriptor {
    BlockDescriptor::new(BlockKind::StereoMixer(width), process_stereo_mixer)
        .with_input(SlotSpec::stereo(ParamName::Input, width))
        .with_output(SlotSpec::vector(ParamName::StereoOut, Width::W2))
}

fn process_stereo_mixer(io: &mut BlockIo<'_>, _: &AudioContext) {
    let (left, right) = io
        .stereo(0)
        .map_or((0.0, 0.0), |(l, r)| (l.sum(), r.sum()));
    io.set_pair(0, left, right);
}
