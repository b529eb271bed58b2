//! Error types for scene construction.
//!
//! Construction-time failures split into two families:
//! - configuration errors: a malformed descriptor or setting that can never
//!   produce a valid engine object (wrong field ranges, degenerate geometry,
//!   non-positive dynamic mass),
//! - engine failures: the engine refused to build an otherwise well-formed
//!   object (e.g. a convex hull that collapses to a lower dimension).
//!
//! Per-tick update calls never return errors; documented best-effort cases
//! (such as a blocked crouch/stand swap) keep the previous state instead.

use thiserror::Error;

/// Result type alias for scene operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Errors that can occur while building shapes, bodies, or controllers.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// A shape descriptor is malformed (missing/invalid fields per variant).
    #[error("invalid shape descriptor: {0}")]
    InvalidShape(String),

    /// Body creation settings are malformed (e.g. dynamic body with mass <= 0).
    #[error("invalid body settings: {0}")]
    InvalidBody(String),

    /// Vehicle configuration is malformed (e.g. non-positive dimensions).
    #[error("invalid vehicle settings: {0}")]
    InvalidVehicle(String),

    /// Character configuration is malformed.
    #[error("invalid character settings: {0}")]
    InvalidCharacter(String),

    /// The engine failed to build an object from well-formed inputs.
    #[error("engine failed to build shape: {0}")]
    ShapeConstruction(String),
}

impl PhysicsError {
    /// Create an invalid shape error.
    pub fn invalid_shape(details: impl Into<String>) -> Self {
        Self::InvalidShape(details.into())
    }

    /// Create an invalid body error.
    pub fn invalid_body(details: impl Into<String>) -> Self {
        Self::InvalidBody(details.into())
    }

    /// Create an invalid vehicle error.
    pub fn invalid_vehicle(details: impl Into<String>) -> Self {
        Self::InvalidVehicle(details.into())
    }

    /// Create an invalid character error.
    pub fn invalid_character(details: impl Into<String>) -> Self {
        Self::InvalidCharacter(details.into())
    }

    /// Create a shape construction error.
    pub fn shape_construction(details: impl Into<String>) -> Self {
        Self::ShapeConstruction(details.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_details() {
        let err = PhysicsError::invalid_shape("convex hull needs at least 4 points");
        assert!(format!("{err}").contains("at least 4 points"));

        let err = PhysicsError::invalid_body("dynamic body mass must be > 0");
        assert!(format!("{err}").contains("mass"));

        let err = PhysicsError::shape_construction("degenerate hull");
        assert!(format!("{err}").contains("degenerate"));
    }
}
