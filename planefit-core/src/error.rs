//! Error types for planefit

use thiserror::Error;

/// Main error type for planefit operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The neighbourhood of `point` held fewer than `required` samples.
    #[error("Insufficient neighbors for point {point}: found {found}, need {required}")]
    InsufficientNeighbors {
        point: usize,
        found: usize,
        required: usize,
    },

    #[error("Matrix is not symmetric: asymmetry {asymmetry:e} exceeds tolerance {tolerance:e}")]
    NonSymmetricInput { asymmetry: f64, tolerance: f64 },

    #[error("Attribute '{name}' already exists with a different value type")]
    AttributeTypeMismatch { name: String },

    #[error("Attribute '{0}' does not exist")]
    MissingAttribute(String),
}

/// Result type alias for planefit operations
pub type Result<T> = std::result::Result<T, Error>;
