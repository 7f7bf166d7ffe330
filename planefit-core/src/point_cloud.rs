//! Point cloud data structures and functionality

use crate::attribute::{
    Attribute, AttributeRegistry, AttributeValue, COLOR_ATTRIBUTE, NORMAL_ATTRIBUTE,
};
use crate::error::{Error, Result};
use crate::point::*;
use std::ops::{Index, Range};

/// A point cloud with immutable positions and named per-point attributes.
///
/// Points are identified by their index, which stays stable for the lifetime
/// of the cloud. Positions cannot change after construction; derived data
/// such as normals lives in the attribute registry.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<Point3f>,
    attributes: AttributeRegistry,
}

impl PointCloud {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<Point3f>) -> Self {
        let attributes = AttributeRegistry::new(points.len());
        Self { points, attributes }
    }

    /// Attach a fully defined color attribute, one color per point
    pub fn with_colors(mut self, colors: Vec<[u8; 3]>) -> Result<Self> {
        self.attributes
            .insert(COLOR_ATTRIBUTE, Attribute::from_values(colors))?;
        Ok(self)
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All point positions, indexed by handle
    pub fn points(&self) -> &[Point3f] {
        &self.points
    }

    /// Position of the point with handle `index`
    pub fn point(&self, index: usize) -> Option<&Point3f> {
        self.points.get(index)
    }

    /// Every point handle in order
    pub fn handles(&self) -> Range<usize> {
        0..self.points.len()
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, Point3f> {
        self.points.iter()
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeRegistry {
        &mut self.attributes
    }

    /// Get or create the attribute `name` (see [`AttributeRegistry::add`])
    pub fn add_attribute<T: AttributeValue>(&mut self, name: &str) -> Result<&mut Attribute<T>> {
        self.attributes.add(name)
    }

    pub fn get_attribute<T: AttributeValue>(&self, name: &str) -> Option<&Attribute<T>> {
        self.attributes.get(name)
    }

    pub fn get_attribute_mut<T: AttributeValue>(&mut self, name: &str) -> Option<&mut Attribute<T>> {
        self.attributes.get_mut(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn remove_attribute(&mut self, name: &str) -> bool {
        self.attributes.remove(name)
    }

    /// The normal attribute, if estimation has created it
    pub fn normals(&self) -> Option<&Attribute<Vector3f>> {
        self.attributes.get(NORMAL_ATTRIBUTE)
    }

    /// True when the normal attribute exists and every point has a normal
    pub fn has_normals(&self) -> bool {
        self.normals().is_some_and(Attribute::is_complete)
    }

    pub fn colors(&self) -> Option<&Attribute<[u8; 3]>> {
        self.attributes.get(COLOR_ATTRIBUTE)
    }

    /// Reject clouds containing NaN or infinite coordinates
    pub fn validate_finite(&self) -> Result<()> {
        match self.points.iter().position(|p| !is_finite_point(p)) {
            Some(index) => Err(Error::InvalidInput(format!(
                "point {index} has a non-finite coordinate"
            ))),
            None => Ok(()),
        }
    }
}

impl Index<usize> for PointCloud {
    type Output = Point3f;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3f;
    type IntoIter = std::slice::Iter<'a, Point3f>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl FromIterator<Point3f> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3f>>(iter: I) -> Self {
        Self::from_points(Vec::from_iter(iter))
    }
}

impl From<Vec<Point3f>> for PointCloud {
    fn from(points: Vec<Point3f>) -> Self {
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CURVATURE_ATTRIBUTE;

    fn triangle() -> PointCloud {
        PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn new_cloud_has_no_attributes() {
        let cloud = triangle();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.handles(), 0..3);
        assert!(cloud.normals().is_none());
        assert!(!cloud.has_normals());
        assert!(cloud.attributes().is_empty());
    }

    #[test]
    fn attributes_are_sized_to_the_cloud() {
        let mut cloud = triangle();
        let curvature = cloud.add_attribute::<f32>(CURVATURE_ATTRIBUTE).unwrap();
        assert_eq!(curvature.len(), 3);
        assert!(cloud.has_attribute(CURVATURE_ATTRIBUTE));
        assert!(cloud.remove_attribute(CURVATURE_ATTRIBUTE));
        assert!(!cloud.has_attribute(CURVATURE_ATTRIBUTE));
    }

    #[test]
    fn partial_normals_are_not_complete() {
        let mut cloud = triangle();
        cloud
            .add_attribute::<Vector3f>(NORMAL_ATTRIBUTE)
            .unwrap()
            .set(0, Vector3f::z())
            .unwrap();
        assert!(cloud.normals().is_some());
        assert!(!cloud.has_normals());
    }

    #[test]
    fn colors_must_match_point_count() {
        assert!(triangle().with_colors(vec![[1, 2, 3]]).is_err());
        let cloud = triangle().with_colors(vec![[10, 20, 30]; 3]).unwrap();
        assert_eq!(cloud.colors().unwrap().get(2), Some(&[10, 20, 30]));
    }

    #[test]
    fn collect_and_index() {
        let cloud: PointCloud = (0..4).map(|i| Point3f::new(i as f32, 0.0, 0.0)).collect();
        assert_eq!(cloud[3], Point3f::new(3.0, 0.0, 0.0));
        assert_eq!(cloud.point(4), None);
        assert_eq!((&cloud).into_iter().count(), 4);
    }

    #[test]
    fn non_finite_points_are_reported() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(f32::NAN, 0.0, 0.0),
        ]);
        assert_eq!(
            cloud.validate_finite(),
            Err(Error::InvalidInput(
                "point 1 has a non-finite coordinate".to_string()
            ))
        );
        assert!(triangle().validate_finite().is_ok());
    }
}
