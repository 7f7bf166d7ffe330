//! # planefit algorithms
//!
//! Spatial search, symmetric eigen-decomposition and k-nearest-neighbour
//! normal estimation for point clouds.
//!
//! The pipeline builds a [`KdTree`] once, fits a plane to every point's
//! neighbourhood through its covariance matrix, and stores the direction of
//! least variance in the cloud's `normal` attribute.

pub mod eigen;
pub mod export;
pub mod nearest_neighbor;
pub mod normals;

// Re-export commonly used items
pub use eigen::*;
pub use export::*;
pub use nearest_neighbor::*;
pub use normals::*;
