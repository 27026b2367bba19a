//! Error types for graph mutation and engine configuration.
//!
//! Every error here is raised on the control path and is recoverable: the
//! rejected call leaves the graph exactly as it was. The audio path has no
//! error channel.

use thiserror::Error;

use crate::slot::SlotShape;

/// The kind of record a stale or unknown handle referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Block,
    Wire,
    Slot,
    /// An input or output index past the block's declared slots
    Port,
}

/// Which bounded resource a mutation would have overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// More than 16 wires feeding one block
    InboundWires,
    /// A descriptor with more than 8 inputs
    Inputs,
    /// A descriptor with more than 4 outputs
    Outputs,
}

/// Errors from structural and parameter edits of the patch graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{0:?} not found")]
    NotFound(Entity),

    #[error("destination input is already driven by a wire")]
    InputAlreadyConnected,

    #[error("capacity exceeded: {0:?}")]
    CapacityExceeded(Limit),

    #[error("shape mismatch: cannot carry {from:?} into {to:?}")]
    ShapeMismatch { from: SlotShape, to: SlotShape },

    #[error("edit would make the graph cyclic")]
    CycleDetected,
}

/// Errors from loading or validating an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),

    #[cfg(feature = "json")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
