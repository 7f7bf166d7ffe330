//! Core data structures and traits for planefit
//!
//! This crate provides the point types, the [`PointCloud`] container with its
//! typed per-point attribute registry, the nearest neighbor search trait and
//! the shared error type.

pub mod point;
pub mod point_cloud;
pub mod attribute;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use attribute::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3};
