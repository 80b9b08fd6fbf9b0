//! PoseSink trait - persistence collaborator interface
//!
//! The core never persists state itself; it hands every accepted pose to a sink.

use crate::{ContractError, PoseFrame};

/// Durable storage for the last-known pose
///
/// Called from the coordinator on every accepted pose update, on the caller's
/// task. Implementations should be quick; errors are logged, never propagated.
pub trait PoseSink: Send + Sync {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Persist the pose
    ///
    /// # Errors
    /// Returns a write error (should include context)
    fn persist(&self, pose: &PoseFrame) -> Result<(), ContractError>;
}
