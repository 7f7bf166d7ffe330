//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use bytemuck::{Pod, Zeroable};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// A point paired with its estimated normal.
///
/// Laid out as six contiguous `f32`s so slices can be handed to GPU
/// uploaders through `bytemuck::cast_slice`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct NormalPoint3f {
    pub position: Point3f,
    pub normal: Vector3f,
}

unsafe impl Pod for NormalPoint3f {}
unsafe impl Zeroable for NormalPoint3f {}

impl NormalPoint3f {
    pub fn new(position: Point3f, normal: Vector3f) -> Self {
        Self { position, normal }
    }
}

impl Default for NormalPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            normal: Vector3f::new(0.0, 0.0, 1.0),
        }
    }
}

/// Returns true when all three coordinates are finite.
pub fn is_finite_point(point: &Point3f) -> bool {
    point.coords.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_point_casts_to_flat_floats() {
        let records = [
            NormalPoint3f::new(Point3f::new(1.0, 2.0, 3.0), Vector3f::new(0.0, 0.0, 1.0)),
            NormalPoint3f::default(),
        ];
        let floats: &[f32] = bytemuck::cast_slice(&records);
        assert_eq!(floats.len(), 12);
        assert_eq!(&floats[..6], &[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn finite_check_rejects_nan_and_infinity() {
        assert!(is_finite_point(&Point3f::new(0.0, -1.0, 2.5)));
        assert!(!is_finite_point(&Point3f::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_finite_point(&Point3f::new(0.0, f32::INFINITY, 0.0)));
    }
}
