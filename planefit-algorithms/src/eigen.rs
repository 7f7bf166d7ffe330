//! Eigen-decomposition of symmetric 3x3 matrices
//!
//! [`SymmetricEigenSolver`] runs cyclic Jacobi rotations until the
//! off-diagonal mass vanishes relative to the matrix norm. Each rotation is
//! orthogonal, so the accumulated eigenvectors stay orthonormal even for
//! rank-deficient or isotropic input, where the eigenbasis is not unique.

use nalgebra::{Matrix3, Vector3};
use planefit_core::{Error, Result};
use tracing::debug;

/// Default upper bound on Jacobi sweeps. Three by three matrices converge in
/// well under ten sweeps; the bound only guards against NaN input.
pub const DEFAULT_MAX_SWEEPS: usize = 32;

/// Plane pairs visited by one cyclic sweep
const ROTATION_PLANES: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

/// An eigenvalue with its unit eigenvector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenPair {
    pub value: f64,
    pub vector: Vector3<f64>,
}

/// Jacobi eigen solver for symmetric 3x3 matrices.
///
/// Pairs are returned in the diagonal order of the converged iteration, which
/// carries no ordering guarantee. Callers select what they need, for example
/// with [`smallest_eigenpair`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigenSolver {
    max_sweeps: usize,
    symmetry_tolerance: Option<f64>,
}

impl Default for SymmetricEigenSolver {
    fn default() -> Self {
        Self {
            max_sweeps: DEFAULT_MAX_SWEEPS,
            symmetry_tolerance: None,
        }
    }
}

impl SymmetricEigenSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Result<Self> {
        if max_sweeps == 0 {
            return Err(Error::InvalidConfiguration(
                "max_sweeps must be greater than 0".to_string(),
            ));
        }
        self.max_sweeps = max_sweeps;
        Ok(self)
    }

    /// Reject input whose mirrored entries differ by more than
    /// `tolerance * max(1, max |m_ij|)`.
    pub fn with_symmetry_check(mut self, tolerance: f64) -> Result<Self> {
        if !(tolerance >= 0.0 && tolerance.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "symmetry tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
        self.symmetry_tolerance = Some(tolerance);
        Ok(self)
    }

    pub fn max_sweeps(&self) -> usize {
        self.max_sweeps
    }

    pub fn symmetry_tolerance(&self) -> Option<f64> {
        self.symmetry_tolerance
    }

    /// Compute the three eigenpairs of `matrix`
    pub fn solve(&self, matrix: &Matrix3<f64>) -> Result<[EigenPair; 3]> {
        if let Some(tolerance) = self.symmetry_tolerance {
            check_symmetry(matrix, tolerance)?;
        }

        let mut a = *matrix;
        let mut v = Matrix3::identity();
        let threshold = f64::EPSILON * f64::EPSILON * a.norm_squared();

        let mut sweeps = 0;
        while sweeps < self.max_sweeps && off_diagonal_norm_squared(&a) > threshold {
            for (p, q) in ROTATION_PLANES {
                rotate(&mut a, &mut v, p, q);
            }
            sweeps += 1;
        }

        let residual = off_diagonal_norm_squared(&a);
        if residual > threshold {
            debug!(sweeps, residual, "Jacobi iteration did not converge");
        }

        Ok(std::array::from_fn(|i| EigenPair {
            value: a[(i, i)],
            vector: v.column(i).normalize(),
        }))
    }
}

/// The pair with the strictly smallest eigenvalue; the first one wins on ties
pub fn smallest_eigenpair(pairs: &[EigenPair; 3]) -> EigenPair {
    pairs[1..].iter().fold(pairs[0], |smallest, &pair| {
        if pair.value < smallest.value {
            pair
        } else {
            smallest
        }
    })
}

fn check_symmetry(matrix: &Matrix3<f64>, tolerance: f64) -> Result<()> {
    let asymmetry = (matrix - matrix.transpose()).amax();
    let scale = matrix.amax().max(1.0);
    if asymmetry > tolerance * scale {
        return Err(Error::NonSymmetricInput {
            asymmetry,
            tolerance,
        });
    }
    Ok(())
}

fn off_diagonal_norm_squared(a: &Matrix3<f64>) -> f64 {
    ROTATION_PLANES
        .iter()
        .map(|&(p, q)| 2.0 * a[(p, q)] * a[(p, q)])
        .sum()
}

/// Apply the rotation that zeroes `a[(p, q)]`, accumulating it into `v`
fn rotate(a: &mut Matrix3<f64>, v: &mut Matrix3<f64>, p: usize, q: usize) {
    let apq = a[(p, q)];
    if apq == 0.0 {
        return;
    }

    // t = tan(angle) is the smaller root of t^2 + 2 theta t - 1 = 0
    let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
    let c = 1.0 / t.hypot(1.0);
    let s = t * c;

    let mut rotation = Matrix3::identity();
    rotation[(p, p)] = c;
    rotation[(q, q)] = c;
    rotation[(p, q)] = s;
    rotation[(q, p)] = -s;

    *a = rotation.transpose() * *a * rotation;
    a[(p, q)] = 0.0;
    a[(q, p)] = 0.0;
    *v *= rotation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn reconstruct(pairs: &[EigenPair; 3]) -> Matrix3<f64> {
        pairs
            .iter()
            .map(|p| p.vector * p.vector.transpose() * p.value)
            .sum()
    }

    #[test]
    fn diagonal_matrix_keeps_canonical_basis() {
        let m = Matrix3::from_diagonal(&Vector3::new(3.0, 1.0, 2.0));
        let pairs = SymmetricEigenSolver::new().solve(&m).unwrap();
        assert_eq!(pairs[0].value, 3.0);
        assert_eq!(pairs[1].value, 1.0);
        assert_eq!(pairs[2].value, 2.0);
        assert_eq!(pairs[0].vector, Vector3::x());
        assert_eq!(pairs[1].vector, Vector3::y());
        assert_eq!(pairs[2].vector, Vector3::z());
    }

    #[test]
    fn known_spectrum() {
        // Eigenvalues 1, 3, 3 with (1, -1, 0) / sqrt(2) for the smallest.
        let m = Matrix3::new(2.0, 1.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 3.0);
        let pairs = SymmetricEigenSolver::new().solve(&m).unwrap();

        let smallest = smallest_eigenpair(&pairs);
        assert_relative_eq!(smallest.value, 1.0, epsilon = 1e-12);
        let expected = Vector3::new(1.0, -1.0, 0.0).normalize();
        assert_relative_eq!(smallest.vector.dot(&expected).abs(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(reconstruct(&pairs), m, epsilon = 1e-12);
    }

    #[test]
    fn zero_matrix_is_valid_input() {
        let pairs = SymmetricEigenSolver::new().solve(&Matrix3::zeros()).unwrap();
        for pair in &pairs {
            assert_eq!(pair.value, 0.0);
            assert_relative_eq!(pair.vector.norm(), 1.0);
        }
    }

    #[test]
    fn isotropic_matrix_returns_orthonormal_basis() {
        let m = Matrix3::identity() * 4.0;
        let pairs = SymmetricEigenSolver::new().solve(&m).unwrap();
        for (i, a) in pairs.iter().enumerate() {
            assert_relative_eq!(a.value, 4.0);
            for b in &pairs[i + 1..] {
                assert_relative_eq!(a.vector.dot(&b.vector), 0.0);
            }
        }
    }

    #[test]
    fn tie_selects_first_listed_vector() {
        let m = Matrix3::from_diagonal(&Vector3::new(2.0, 1.0, 1.0));
        let solver = SymmetricEigenSolver::new();
        let first = smallest_eigenpair(&solver.solve(&m).unwrap());
        let second = smallest_eigenpair(&solver.solve(&m).unwrap());
        assert_eq!(first.vector, Vector3::y());
        assert_eq!(first, second);
    }

    #[test]
    fn fold_keeps_first_of_equal_values() {
        let pairs = [
            EigenPair { value: 0.5, vector: Vector3::z() },
            EigenPair { value: 0.5, vector: Vector3::x() },
            EigenPair { value: 0.7, vector: Vector3::y() },
        ];
        assert_eq!(smallest_eigenpair(&pairs).vector, Vector3::z());
    }

    #[test]
    fn symmetry_check_rejects_asymmetric_input() {
        let m = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let solver = SymmetricEigenSolver::new().with_symmetry_check(1e-9).unwrap();
        match solver.solve(&m) {
            Err(Error::NonSymmetricInput { asymmetry, tolerance }) => {
                assert_relative_eq!(asymmetry, 0.5);
                assert_eq!(tolerance, 1e-9);
            }
            other => panic!("expected NonSymmetricInput, got {other:?}"),
        }
        // Without validation the solver takes the input as given.
        assert!(SymmetricEigenSolver::new().solve(&m).is_ok());
    }

    #[test]
    fn invalid_solver_settings_are_rejected() {
        assert!(matches!(
            SymmetricEigenSolver::new().with_max_sweeps(0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SymmetricEigenSolver::new().with_symmetry_check(f64::NAN),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    proptest! {
        #[test]
        fn decomposition_reconstructs_input(
            d in prop::array::uniform3(-10.0f64..10.0),
            o in prop::array::uniform3(-10.0f64..10.0),
        ) {
            let m = Matrix3::new(
                d[0], o[0], o[1],
                o[0], d[1], o[2],
                o[1], o[2], d[2],
            );
            let pairs = SymmetricEigenSolver::new().solve(&m).unwrap();

            for (i, a) in pairs.iter().enumerate() {
                prop_assert!((a.vector.norm() - 1.0).abs() < 1e-12);
                prop_assert!((m * a.vector - a.vector * a.value).norm() < 1e-9);
                for b in &pairs[i + 1..] {
                    prop_assert!(a.vector.dot(&b.vector).abs() < 1e-9);
                }
            }
            prop_assert!((reconstruct(&pairs) - m).norm() < 1e-9);
        }
    }
}
