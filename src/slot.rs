//! Slot Records
//!
//! Slots are the typed value holders a block reads from (inputs) and writes
//! to (outputs). A slot is created with its block and destroyed with it; it
//! is never shared between two blocks.
//!
//! Vector payloads live in a fixed `[f32; 32]` lane array with a runtime
//! width, so every shape fits in a slot record without heap allocation and
//! code that walks lanes is written once for all widths.

use serde::{Deserialize, Serialize};

use crate::store::BlockHandle;

/// Largest supported vector width
pub const MAX_LANES: usize = 32;

/// Lane count of a vector slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    W2,
    W4,
    W8,
    W16,
    W32,
}

impl Width {
    pub const ALL: [Width; 5] = [Width::W2, Width::W4, Width::W8, Width::W16, Width::W32];

    pub const fn lanes(self) -> usize {
        match self {
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
        }
    }

    pub fn from_lanes(lanes: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.lanes() == lanes)
    }
}

/// Shape of a slot payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotShape {
    /// A single float (1D)
    Scalar,
    /// N independent lanes. `Vector(W2)` doubles as a stereo pair.
    Vector(Width),
    /// Independent left and right N-lane payloads (stereo mixer inputs)
    StereoVector(Width),
}

impl SlotShape {
    /// Lanes per channel
    pub fn lanes(&self) -> usize {
        match self {
            SlotShape::Scalar => 1,
            SlotShape::Vector(w) | SlotShape::StereoVector(w) => w.lanes(),
        }
    }

    /// True for the two-lane vector used as a stereo pair output
    pub fn is_pair(&self) -> bool {
        matches!(self, SlotShape::Vector(Width::W2))
    }
}

/// Semantic tag attached to a slot, following block-parameter conventions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamName {
    #[default]
    None,
    Input,
    Freq,
    Phase,
    Amp,
    Attack,
    Decay,
    Sustain,
    Release,
    Out,
    StereoOut,
}

/// Whether a slot is read or written by its block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

/// Fixed-capacity lane buffer with a runtime width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lanes {
    width: Width,
    data: [f32; MAX_LANES],
}

impl Lanes {
    pub fn zeroed(width: Width) -> Self {
        Self::splat(width, 0.0)
    }

    pub fn splat(width: Width, value: f32) -> Self {
        let mut data = [0.0; MAX_LANES];
        data[..width.lanes()].fill(value);
        Self { width, data }
    }

    /// Build from a slice whose length is a supported width
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let width = Width::from_lanes(values.len())?;
        let mut data = [0.0; MAX_LANES];
        data[..values.len()].copy_from_slice(values);
        Some(Self { width, data })
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.width.lanes()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data[..self.width.lanes()]
    }

    pub fn get(&self, lane: usize) -> Option<f32> {
        self.as_slice().get(lane).copied()
    }

    pub fn sum(&self) -> f32 {
        self.as_slice().iter().sum()
    }
}

/// Current payload of a slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    Scalar(f32),
    Vector(Lanes),
    Stereo { left: Lanes, right: Lanes },
}

impl SlotValue {
    pub fn zeroed(shape: SlotShape) -> Self {
        match shape {
            SlotShape::Scalar => SlotValue::Scalar(0.0),
            SlotShape::Vector(w) => SlotValue::Vector(Lanes::zeroed(w)),
            SlotShape::StereoVector(w) => SlotValue::Stereo {
                left: Lanes::zeroed(w),
                right: Lanes::zeroed(w),
            },
        }
    }

    pub fn shape(&self) -> SlotShape {
        match self {
            SlotValue::Scalar(_) => SlotShape::Scalar,
            SlotValue::Vector(l) => SlotShape::Vector(l.width()),
            SlotValue::Stereo { left, .. } => SlotShape::StereoVector(left.width()),
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            SlotValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_lanes(&self) -> Option<&Lanes> {
        match self {
            SlotValue::Vector(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_lanes_mut(&mut self) -> Option<&mut Lanes> {
        match self {
            SlotValue::Vector(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_stereo(&self) -> Option<(&Lanes, &Lanes)> {
        match self {
            SlotValue::Stereo { left, right } => Some((left, right)),
            _ => None,
        }
    }
}

/// Declaration of one slot in a block descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSpec {
    pub tag: ParamName,
    pub initial: SlotValue,
}

impl SlotSpec {
    pub fn scalar(tag: ParamName, value: f32) -> Self {
        Self {
            tag,
            initial: SlotValue::Scalar(value),
        }
    }

    pub fn vector(tag: ParamName, width: Width) -> Self {
        Self {
            tag,
            initial: SlotValue::Vector(Lanes::zeroed(width)),
        }
    }

    pub fn stereo(tag: ParamName, width: Width) -> Self {
        Self {
            tag,
            initial: SlotValue::zeroed(SlotShape::StereoVector(width)),
        }
    }

    pub fn shape(&self) -> SlotShape {
        self.initial.shape()
    }
}

/// A live slot record in the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub owner: BlockHandle,
    pub direction: Direction,
    pub tag: ParamName,
    pub value: SlotValue,
}

impl Slot {
    pub fn shape(&self) -> SlotShape {
        self.value.shape()
    }
}
