//! Error types for scenario loading and trace persistence.

use thiserror::Error;

/// Errors raised while building the body registry or persisting traces.
///
/// Nothing in this enum is ever returned from a simulation step; numerical
/// trouble during stepping is recovered in place and reported as a warning.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// A device or joint references a body that is not in the registry.
    #[error("{kind} '{name}' references missing body '{body}'")]
    MissingBody {
        /// Device kind ("actuator", "sensor", "joint").
        kind: &'static str,
        /// Device or joint name.
        name: String,
        /// Referenced body name.
        body: String,
    },

    /// Two devices on the robot share a name.
    #[error("Duplicate device name: {0}")]
    DuplicateDevice(String),

    /// Two bodies share a name.
    #[error("Duplicate body name: {0}")]
    DuplicateBody(String),

    /// A joint was configured with negative compliance.
    #[error("Joint '{name}' has negative compliance {compliance}")]
    NegativeCompliance {
        /// Joint name.
        name: String,
        /// Offending value.
        compliance: f64,
    },

    /// Failed to create a collision shape.
    #[error("Failed to create collision shape for {name}: {reason}")]
    CollisionShape {
        /// Body name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Detailed motor preset not known.
    #[error("Unknown wheel preset: {0}")]
    UnknownPreset(String),

    /// Named device or body not found for removal.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Trace file could not be written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Trace could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
