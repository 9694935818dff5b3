//! Controller error taxonomy.
//!
//! None of these errors are fatal. Every system boundary catches them, logs
//! a warning, and degrades to a safe no-op for that tick. The worst case a
//! player can observe is one tick of unresponsiveness.

use bevy::prelude::*;
use thiserror::Error;

/// Errors raised by controller operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The physics body (or one of its components) has not been constructed
    /// yet. Body operations must no-op safely in this state.
    #[error("physics body for {entity:?} is not ready")]
    BodyNotReady { entity: Entity },

    /// A NaN or infinite value was read back from the physics engine.
    /// The operation that detected it is aborted for this tick.
    #[error("non-finite {quantity} read back from physics body {entity:?}")]
    InvalidNumeric {
        entity: Entity,
        quantity: &'static str,
    },

    /// An optional physics capability is absent on this backend.
    /// Callers fall back to the guaranteed velocity-based path.
    #[error("physics backend does not support {capability}")]
    Unsupported { capability: &'static str },

    /// A phase transition or evaluation violated the machine's invariants
    /// (for example a self-transition). The current phase is retained.
    #[error("phase evaluation failed: {reason}")]
    PhaseEvaluation { reason: &'static str },
}
