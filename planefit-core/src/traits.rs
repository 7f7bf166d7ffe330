//! Core traits for planefit

use crate::point::Point3f;

/// Trait for nearest neighbor search functionality.
///
/// Implementations index a fixed point set; returned handles are indices into
/// that set and every result is ordered by ascending Euclidean distance.
pub trait NearestNeighborSearch {
    /// Find the k nearest neighbors to a query point.
    ///
    /// If the query point is a member of the indexed set, its coordinate is
    /// part of the result at distance zero. Equal distances are ordered by
    /// ascending handle, so when more than `k` points share the query's
    /// coordinate the lowest handles are returned, which need not include the
    /// query's own handle. Fewer than `k` entries are returned only when the
    /// set holds fewer than `k` points.
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find all neighbors within a given radius (inclusive)
    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)>;

    /// Number of indexed points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
