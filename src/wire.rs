//! Wire Records and Transmission Adapters
//!
//! A wire moves data from one block's output slot into another block's input
//! slot once per sample, applying `value * gain + offset` on the way. How the
//! data is moved depends on the shapes at each end and is fixed when the wire
//! is connected, by picking one [`Adapter`].
//!
//! Mixer inputs are a single vector (or stereo vector) slot addressed by
//! lane: for the lane-scatter adapters the wire's destination input index is
//! the lane number, and the wire always targets input 0 of the mixer.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::slot::{SlotShape, SlotValue};
use crate::store::{BlockHandle, SlotHandle};

/// Shape adapter selected at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Adapter {
    /// Same shape at both ends: scalar to scalar, or lane-wise between equal
    /// vectors or stereo vectors
    Direct,
    /// Scalar replicated into every lane of a vector input
    Broadcast,
    /// Scalar written into lane `k` of a mono mixer input
    MonoToMixerLane,
    /// Stereo pair written into lane `k` of both channels of a stereo mixer input
    StereoToMixerLane,
    /// Scalar written into lane `k` of both channels of a stereo mixer input
    MonoToStereoLane,
}

impl Adapter {
    /// Whether the destination input index of a wire using this adapter is a lane
    pub fn is_lane_scatter(self) -> bool {
        matches!(
            self,
            Adapter::MonoToMixerLane | Adapter::StereoToMixerLane | Adapter::MonoToStereoLane
        )
    }

    /// Check that this adapter can carry `from` into `to`. For lane-scatter
    /// adapters `lane` must address an existing lane of the destination.
    pub fn check(self, from: SlotShape, to: SlotShape, lane: usize) -> Result<(), GraphError> {
        let ok = match (self, from, to) {
            (Adapter::Direct, a, b) => a == b,
            (Adapter::Broadcast, SlotShape::Scalar, SlotShape::Vector(_)) => true,
            (Adapter::MonoToMixerLane, SlotShape::Scalar, SlotShape::Vector(w)) => lane < w.lanes(),
            (Adapter::StereoToMixerLane, src, SlotShape::StereoVector(w)) => {
                src.is_pair() && lane < w.lanes()
            }
            (Adapter::MonoToStereoLane, SlotShape::Scalar, SlotShape::StereoVector(w)) => {
                lane < w.lanes()
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(GraphError::ShapeMismatch { from, to })
        }
    }

    /// Carry `src` into `dst`. Shapes were validated at connect time; any
    /// other combination is left untouched.
    pub fn transmit(self, src: &SlotValue, dst: &mut SlotValue, lane: usize, gain: f32, offset: f32) {
        let scale = |v: f32| v * gain + offset;
        match (self, src, dst) {
            (Adapter::Direct, SlotValue::Scalar(s), SlotValue::Scalar(d)) => *d = scale(*s),
            (Adapter::Direct, SlotValue::Vector(s), SlotValue::Vector(d)) => {
                for (d, s) in d.as_mut_slice().iter_mut().zip(s.as_slice()) {
                    *d = scale(*s);
                }
            }
            (
                Adapter::Direct,
                SlotValue::Stereo { left: sl, right: sr },
                SlotValue::Stereo { left: dl, right: dr },
            ) => {
                for (d, s) in dl.as_mut_slice().iter_mut().zip(sl.as_slice()) {
                    *d = scale(*s);
                }
                for (d, s) in dr.as_mut_slice().iter_mut().zip(sr.as_slice()) {
                    *d = scale(*s);
                }
            }
            (Adapter::Broadcast, SlotValue::Scalar(s), SlotValue::Vector(d)) => {
                d.as_mut_slice().fill(scale(*s));
            }
            (Adapter::MonoToMixerLane, SlotValue::Scalar(s), SlotValue::Vector(d)) => {
                if let Some(slot) = d.as_mut_slice().get_mut(lane) {
                    *slot = scale(*s);
                }
            }
            (Adapter::StereoToMixerLane, SlotValue::Vector(pair), SlotValue::Stereo { left, right }) => {
                if let (Some(l), Some(r)) = (pair.get(0), pair.get(1)) {
                    if let Some(d) = left.as_mut_slice().get_mut(lane) {
                        *d = scale(l);
                    }
                    if let Some(d) = right.as_mut_slice().get_mut(lane) {
                        *d = scale(r);
                    }
                }
            }
            (Adapter::MonoToStereoLane, SlotValue::Scalar(s), SlotValue::Stereo { left, right }) => {
                let v = scale(*s);
                if let Some(d) = left.as_mut_slice().get_mut(lane) {
                    *d = v;
                }
                if let Some(d) = right.as_mut_slice().get_mut(lane) {
                    *d = v;
                }
            }
            _ => {}
        }
    }

    /// Put back the part of `dst` this adapter writes, taken from `saved`
    pub(crate) fn restore(self, saved: &SlotValue, dst: &mut SlotValue, lane: usize) {
        if !self.is_lane_scatter() {
            *dst = *saved;
            return;
        }
        match (saved, dst) {
            (SlotValue::Vector(s), SlotValue::Vector(d)) => {
                if let (Some(v), Some(d)) = (s.get(lane), d.as_mut_slice().get_mut(lane)) {
                    *d = v;
                }
            }
            (
                SlotValue::Stereo { left: sl, right: sr },
                SlotValue::Stereo { left: dl, right: dr },
            ) => {
                if let (Some(v), Some(d)) = (sl.get(lane), dl.as_mut_slice().get_mut(lane)) {
                    *d = v;
                }
                if let (Some(v), Some(d)) = (sr.get(lane), dr.as_mut_slice().get_mut(lane)) {
                    *d = v;
                }
            }
            _ => {}
        }
    }
}

/// A live wire record in the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireRecord {
    pub from_block: BlockHandle,
    pub from_output: usize,
    pub to_block: BlockHandle,
    /// Input index on the destination block, or the lane for mixer adapters
    pub to_input: usize,
    pub gain: f32,
    pub offset: f32,
    pub adapter: Adapter,
    pub(crate) source: SlotHandle,
    pub(crate) target: SlotHandle,
    /// Destination value from before the wire was connected
    pub(crate) saved: SlotValue,
}

impl WireRecord {
    pub fn source_slot(&self) -> SlotHandle {
        self.source
    }

    pub fn target_slot(&self) -> SlotHandle {
        self.target
    }

    /// The lane written by a mixer adapter
    pub fn lane(&self) -> Option<usize> {
        self.adapter.is_lane_scatter().then_some(self.to_input)
    }

    /// Lane index passed to the adapter; zero for whole-slot adapters
    pub(crate) fn lane_or_zero(&self) -> usize {
        self.lane().unwrap_or(0)
    }

    /// Whether this wire already drives the destination addressed by
    /// `target` and `lane`. A whole-slot wire overlaps every lane.
    pub(crate) fn drives(&self, target: SlotHandle, lane: Option<usize>) -> bool {
        if self.target != target {
            return false;
        }
        match (self.lane(), lane) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
