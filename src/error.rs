//! Error types returned by fallible [`crate::world::PhysicsWorld`] operations.

use std::fmt;

/// Errors a caller can recover from: out-of-range configuration, exhausted resources, or a
/// handle that doesn't (or no longer) names a live body/fixture/joint.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// A constructor argument falls outside the range the engine can simulate (non-finite or
    /// negative mass/inertia, non-positive time step, and similar).
    ConfigOutOfRange(String),
    /// A bounded resource (body/fixture/joint count) is already at its configured limit.
    ResourceLimitExceeded(String),
    /// The handle passed in doesn't refer to a body, fixture, or joint currently in the world.
    InvalidHandle(String),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConfigOutOfRange(msg) => write!(f, "configuration out of range: {msg}"),
            Self::ResourceLimitExceeded(msg) => write!(f, "resource limit exceeded: {msg}"),
            Self::InvalidHandle(msg) => write!(f, "invalid handle: {msg}"),
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Convenient result alias for fallible world operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offending_value() {
        let err = PhysicsError::ConfigOutOfRange("mass must be finite".to_string());
        assert!(err.to_string().contains("mass must be finite"));
    }
}
