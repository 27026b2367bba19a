//! # Patchgraph: Real-Time Audio Patch Graph
//!
//! `patchgraph` is a runtime for modular audio patches: blocks with typed
//! input and output slots, joined by wires that scale, offset and reshape
//! values on the way through. The graph can be rewired while audio is
//! running; every structural edit re-sorts the blocks so that each wire's
//! source runs before its destination.
//!
//! ## Architecture
//!
//! The library is organized in three layers:
//!
//! - **Layer 1: Records** - Slots, blocks and wires held in generational
//!   arenas ([`store`]), addressed by stale-safe handles
//! - **Layer 2: Graph** - Shape-checked wiring, cycle rejection and the
//!   topological [`scheduler`]
//! - **Layer 3: Engine** - A thread-safe wrapper joining the control path to
//!   the device callback
//!
//! ## Quick Start
//!
//! ```rust
//! use patchgraph::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//!
//! let osc = engine.add_block(&blocks::sine_osc(440.0, 0.5)).unwrap();
//! let gain = engine.add_block(&blocks::affine(0.8, 0.0)).unwrap();
//! engine.connect(osc, 0, gain, 0, Adapter::Direct).unwrap();
//!
//! let out = engine.view_block(gain).unwrap().output(0).unwrap();
//! engine.set_output(out, 1).unwrap();
//!
//! let mut buffer = [0.0f32; 512];
//! engine.render(&mut buffer);
//! ```

pub mod block;
pub mod blocks;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod slot;
pub mod store;
pub mod wire;

/// Prelude module for convenient imports
pub mod prelude {
    // Layer 1: Records
    pub use crate::block::{
        AudioContext, BlockDescriptor, BlockIo, BlockKind, BlockRecord, ProcessFn,
    };
    pub use crate::slot::{Lanes, ParamName, SlotShape, SlotSpec, SlotValue, Width};
    pub use crate::store::{BlockHandle, SlotHandle, WireHandle};
    pub use crate::wire::{Adapter, WireRecord};

    // Layer 2: Graph
    pub use crate::error::{ConfigError, GraphError};
    pub use crate::graph::{BlockIoView, Graph};

    // Layer 3: Engine
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, GraphSnapshot, OutputRef};

    // Built-in blocks
    pub use crate::blocks;
}

pub use prelude::*;
