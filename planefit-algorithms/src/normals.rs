//! Normal estimation algorithms
//!
//! Each point's normal is the direction of least variance of its k nearest
//! neighbours: the eigenvector of the smallest eigenvalue of the neighbourhood
//! covariance. Normals are axes; their sign is not made consistent across the
//! surface.

use crate::eigen::{smallest_eigenpair, EigenPair, SymmetricEigenSolver};
use crate::nearest_neighbor::KdTree;
use nalgebra::{Matrix3, Vector3};
use planefit_core::{
    Error, NearestNeighborSearch, Point3f, PointCloud, Result, Vector3f, CURVATURE_ATTRIBUTE,
    NORMAL_ATTRIBUTE,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default neighbourhood size
pub const DEFAULT_K_NEIGHBORS: usize = 16;

/// Smallest neighbourhood that can define a plane
pub const MIN_K_NEIGHBORS: usize = 3;

/// Relative gap between the two smallest eigenvalues below which a
/// neighbourhood counts as degenerate
const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Configuration for normal estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalEstimationConfig {
    /// Number of nearest neighbors per point, including the point itself
    pub k_neighbors: usize,
    /// Compute per-point planes on the rayon thread pool
    pub parallel: bool,
    /// Also store the surface variation in the `curvature` attribute
    pub compute_curvature: bool,
    /// Validate covariance symmetry inside the eigen solver
    pub symmetry_tolerance: Option<f64>,
}

impl Default for NormalEstimationConfig {
    fn default() -> Self {
        Self {
            k_neighbors: DEFAULT_K_NEIGHBORS,
            parallel: false,
            compute_curvature: false,
            symmetry_tolerance: None,
        }
    }
}

impl NormalEstimationConfig {
    pub fn with_k(k_neighbors: usize) -> Self {
        Self {
            k_neighbors,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_neighbors < MIN_K_NEIGHBORS {
            return Err(Error::InvalidConfiguration(format!(
                "k_neighbors must be at least {}, got {}",
                MIN_K_NEIGHBORS, self.k_neighbors
            )));
        }
        Ok(())
    }

    fn solver(&self) -> Result<SymmetricEigenSolver> {
        match self.symmetry_tolerance {
            Some(tolerance) => SymmetricEigenSolver::new().with_symmetry_check(tolerance),
            None => Ok(SymmetricEigenSolver::new()),
        }
    }
}

/// Summary of a completed estimation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalEstimationReport {
    pub points: usize,
    pub k_neighbors: usize,
    /// Neighbourhoods whose two smallest eigenvalues coincide, leaving the
    /// normal direction ambiguous
    pub degenerate: usize,
}

/// Result of fitting a plane to one neighbourhood
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPlane {
    pub normal: Vector3f,
    /// Surface variation `λ_min / (λ_0 + λ_1 + λ_2)`
    pub curvature: f32,
    pub degenerate: bool,
}

impl LocalPlane {
    pub fn from_eigenpairs(pairs: &[EigenPair; 3]) -> Self {
        let smallest = smallest_eigenpair(pairs);

        let total: f64 = pairs.iter().map(|p| p.value).sum();
        let curvature = if total > 0.0 {
            (smallest.value / total).max(0.0) as f32
        } else {
            0.0
        };

        let mut values = pairs.map(|p| p.value);
        values.sort_by(f64::total_cmp);
        let degenerate = (values[1] - values[0]).abs() <= DEGENERACY_TOLERANCE * values[2].abs();

        Self {
            normal: smallest.vector.cast::<f32>(),
            curvature,
            degenerate,
        }
    }
}

/// Covariance of the neighbourhood `neighbors` about its centroid.
///
/// Both the centroid and the second moments are divided by the neighbourhood
/// size, which the estimator guarantees to equal the requested `k`.
pub fn local_covariance(points: &[Point3f], neighbors: &[usize]) -> Matrix3<f64> {
    if neighbors.is_empty() {
        return Matrix3::zeros();
    }

    let count = neighbors.len() as f64;
    let coords = || neighbors.iter().map(|&i| points[i].coords.cast::<f64>());

    let centroid = coords().sum::<Vector3<f64>>() / count;
    coords()
        .map(|p| {
            let deviation = p - centroid;
            deviation * deviation.transpose()
        })
        .sum::<Matrix3<f64>>()
        / count
}

/// Estimate normals for a point cloud using k-nearest neighbors.
///
/// Normals are written into the cloud's `normal` attribute, which is created
/// on first use.
///
/// # Example
/// ```rust
/// use planefit_core::{PointCloud, Point3f};
/// use planefit_algorithms::estimate_normals;
///
/// fn main() -> planefit_core::Result<()> {
///     let mut cloud: PointCloud = (0..25)
///         .map(|i| Point3f::new((i % 5) as f32, (i / 5) as f32, 0.0))
///         .collect();
///
///     estimate_normals(&mut cloud, 8)?;
///     let normal = cloud.normals().and_then(|n| n.get(12)).copied();
///     assert!(normal.is_some_and(|n| n.z.abs() > 0.99));
///     Ok(())
/// }
/// ```
pub fn estimate_normals(cloud: &mut PointCloud, k: usize) -> Result<NormalEstimationReport> {
    estimate_normals_with_config(cloud, &NormalEstimationConfig::with_k(k))
}

/// Estimate normals, building a fresh [`KdTree`] over the cloud
pub fn estimate_normals_with_config(
    cloud: &mut PointCloud,
    config: &NormalEstimationConfig,
) -> Result<NormalEstimationReport> {
    validate_request(cloud, config)?;
    let tree = KdTree::from_cloud(cloud)?;
    estimate_normals_with_search(cloud, &tree, config)
}

/// Estimate normals reusing a prebuilt search structure over the same points.
///
/// Every normal slot is cleared before the pass starts, and a stale
/// `curvature` attribute is dropped when curvature is not requested. The pass
/// aborts on the first point whose neighbourhood holds fewer than `k` points.
/// Normals already written in this pass are kept; callers should check
/// [`PointCloud::has_normals`] before consuming a cloud after an error.
pub fn estimate_normals_with_search<S>(
    cloud: &mut PointCloud,
    search: &S,
    config: &NormalEstimationConfig,
) -> Result<NormalEstimationReport>
where
    S: NearestNeighborSearch + Sync,
{
    validate_request(cloud, config)?;
    if search.len() != cloud.len() {
        return Err(Error::InvalidInput(format!(
            "search structure indexes {} points but the cloud has {}",
            search.len(),
            cloud.len()
        )));
    }
    let solver = config.solver()?;

    info!(
        points = cloud.len(),
        k = config.k_neighbors,
        parallel = config.parallel,
        "Estimating normals"
    );

    // Slots from an earlier pass must not survive next to this pass's output.
    cloud.add_attribute::<Vector3f>(NORMAL_ATTRIBUTE)?.reset();
    if config.compute_curvature {
        cloud.add_attribute::<f32>(CURVATURE_ATTRIBUTE)?.reset();
    } else {
        cloud.remove_attribute(CURVATURE_ATTRIBUTE);
    }

    let degenerate = if config.parallel {
        estimate_parallel(cloud, search, &solver, config)?
    } else {
        estimate_serial(cloud, search, &solver, config)?
    };

    info!(degenerate, "Normal estimation finished");
    Ok(NormalEstimationReport {
        points: cloud.len(),
        k_neighbors: config.k_neighbors,
        degenerate,
    })
}

fn validate_request(cloud: &PointCloud, config: &NormalEstimationConfig) -> Result<()> {
    if cloud.is_empty() {
        return Err(Error::InvalidInput("point cloud is empty".to_string()));
    }
    config.validate()
}

fn estimate_serial<S: NearestNeighborSearch>(
    cloud: &mut PointCloud,
    search: &S,
    solver: &SymmetricEigenSolver,
    config: &NormalEstimationConfig,
) -> Result<usize> {
    let mut degenerate = 0;
    for index in cloud.handles() {
        let plane = fit_local_plane(cloud.points(), search, index, config.k_neighbors, solver)?;
        store_plane(cloud, index, &plane, config.compute_curvature)?;
        degenerate += usize::from(plane.degenerate);
    }
    Ok(degenerate)
}

fn estimate_parallel<S: NearestNeighborSearch + Sync>(
    cloud: &mut PointCloud,
    search: &S,
    solver: &SymmetricEigenSolver,
    config: &NormalEstimationConfig,
) -> Result<usize> {
    let k = config.k_neighbors;
    // Every neighbourhood is short exactly when the whole set is, so check
    // once before launching any work.
    if search.len() < k {
        return Err(insufficient_neighbors(0, search.len(), k));
    }

    let points = cloud.points();
    let planes = (0..points.len())
        .into_par_iter()
        .map(|index| fit_local_plane(points, search, index, k, solver))
        .collect::<Result<Vec<LocalPlane>>>()?;

    for (index, plane) in planes.iter().enumerate() {
        store_plane(cloud, index, plane, config.compute_curvature)?;
    }
    Ok(planes.iter().filter(|p| p.degenerate).count())
}

fn fit_local_plane<S: NearestNeighborSearch>(
    points: &[Point3f],
    search: &S,
    index: usize,
    k: usize,
    solver: &SymmetricEigenSolver,
) -> Result<LocalPlane> {
    let neighbors: Vec<usize> = search
        .find_k_nearest(&points[index], k)
        .into_iter()
        .map(|(neighbor, _)| neighbor)
        .collect();
    if neighbors.len() < k {
        return Err(insufficient_neighbors(index, neighbors.len(), k));
    }

    let covariance = local_covariance(points, &neighbors);
    let pairs = solver.solve(&covariance)?;
    Ok(LocalPlane::from_eigenpairs(&pairs))
}

fn store_plane(
    cloud: &mut PointCloud,
    index: usize,
    plane: &LocalPlane,
    compute_curvature: bool,
) -> Result<()> {
    cloud
        .add_attribute::<Vector3f>(NORMAL_ATTRIBUTE)?
        .set(index, plane.normal)?;
    if compute_curvature {
        cloud
            .add_attribute::<f32>(CURVATURE_ATTRIBUTE)?
            .set(index, plane.curvature)?;
    }
    Ok(())
}

fn insufficient_neighbors(point: usize, found: usize, required: usize) -> Error {
    warn!(
        point,
        found, required, "Insufficient neighbors, aborting normal estimation"
    );
    Error::InsufficientNeighbors {
        point,
        found,
        required,
    }
}
