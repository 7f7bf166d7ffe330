//! Read-side helpers for consumers of estimated normals
//!
//! Renderers draw each normal as a short line segment starting at its point
//! and upload `NormalPoint3f` records as vertex data. Both need a completed
//! normal attribute, which these helpers verify first.

use planefit_core::{
    Error, NormalPoint3f, Point3f, PointCloud, Result, Vector3f, NORMAL_ATTRIBUTE,
};

/// Default length of a rendered normal segment
pub const DEFAULT_NORMAL_LENGTH: f32 = 0.09;

fn completed_normals(cloud: &PointCloud) -> Result<Vec<Vector3f>> {
    let normals = cloud
        .normals()
        .ok_or_else(|| Error::MissingAttribute(NORMAL_ATTRIBUTE.to_string()))?;
    normals.to_vec().ok_or_else(|| {
        Error::InvalidInput(format!(
            "normal attribute is incomplete: {} of {} points defined",
            normals.defined_count(),
            normals.len()
        ))
    })
}

/// One segment per point, from the point along its unit normal.
///
/// Zero normals produce zero-length segments.
pub fn normal_line_segments(cloud: &PointCloud, length: f32) -> Result<Vec<[Point3f; 2]>> {
    if !(length > 0.0 && length.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "segment length must be finite and positive, got {length}"
        )));
    }
    let normals = completed_normals(cloud)?;

    Ok(cloud
        .iter()
        .zip(&normals)
        .map(|(point, normal)| {
            let direction = normal
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3f::zeros);
            [*point, *point + direction * length]
        })
        .collect())
}

/// Pair every point with its normal
pub fn to_normal_points(cloud: &PointCloud) -> Result<Vec<NormalPoint3f>> {
    let normals = completed_normals(cloud)?;
    Ok(cloud
        .iter()
        .zip(normals)
        .map(|(point, normal)| NormalPoint3f::new(*point, normal))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cloud_with_normals(normals: &[Vector3f]) -> PointCloud {
        let mut cloud: PointCloud = (0..normals.len())
            .map(|i| Point3f::new(i as f32, 0.0, 0.0))
            .collect();
        let attribute = cloud.add_attribute::<Vector3f>(NORMAL_ATTRIBUTE).unwrap();
        for (i, n) in normals.iter().enumerate() {
            attribute.set(i, *n).unwrap();
        }
        cloud
    }

    #[test]
    fn segments_follow_normalized_direction() {
        let cloud = cloud_with_normals(&[Vector3f::new(0.0, 0.0, 2.0), Vector3f::zeros()]);
        let segments = normal_line_segments(&cloud, DEFAULT_NORMAL_LENGTH).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0][0], Point3f::new(0.0, 0.0, 0.0));
        assert_relative_eq!(segments[0][1], Point3f::new(0.0, 0.0, 0.09));
        assert_eq!(segments[1][0], segments[1][1]);
    }

    #[test]
    fn missing_normals_are_reported() {
        let cloud: PointCloud = vec![Point3f::origin()].into();
        assert_eq!(
            normal_line_segments(&cloud, 1.0),
            Err(Error::MissingAttribute(NORMAL_ATTRIBUTE.to_string()))
        );
        assert!(matches!(
            to_normal_points(&cloud),
            Err(Error::MissingAttribute(_))
        ));
    }

    #[test]
    fn incomplete_normals_are_rejected() {
        let mut cloud: PointCloud = vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)].into();
        cloud
            .add_attribute::<Vector3f>(NORMAL_ATTRIBUTE)
            .unwrap()
            .set(0, Vector3f::z())
            .unwrap();
        assert!(matches!(
            to_normal_points(&cloud),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn bad_length_is_rejected() {
        let cloud = cloud_with_normals(&[Vector3f::z()]);
        for length in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                normal_line_segments(&cloud, length),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn normal_points_pair_positions_and_normals() {
        let cloud = cloud_with_normals(&[Vector3f::x(), Vector3f::y()]);
        let records = to_normal_points(&cloud).unwrap();
        assert_eq!(records[1].position, Point3f::new(1.0, 0.0, 0.0));
        assert_eq!(records[1].normal, Vector3f::y());
    }
}
