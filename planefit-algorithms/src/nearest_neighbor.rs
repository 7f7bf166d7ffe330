//! Nearest neighbor search implementations

use planefit_core::{is_finite_point, Error, NearestNeighborSearch, Point3f, PointCloud, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Maximum number of points stored in a single leaf.
const LEAF_SIZE: usize = 16;

/// A neighbor candidate ordered by squared distance, then by handle.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance_squared: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then(self.index.cmp(&other.index))
    }
}

impl Candidate {
    fn into_result(self) -> (usize, f32) {
        (self.index, self.distance_squared.sqrt())
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    /// Range into `KdTree::indices`
    Leaf { start: usize, end: usize },
    Split {
        axis: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

/// KD-Tree implementation for nearest neighbor search.
///
/// The tree is built once from a static point set by splitting at the median
/// of the axis with the largest extent. It is read-only afterwards and safe to
/// query from many threads.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Point3f>,
    indices: Vec<usize>,
    nodes: Vec<Node>,
    root: usize,
}

impl KdTree {
    /// Build a tree over `points`.
    ///
    /// Fails with [`Error::EmptyInput`] for an empty slice and with
    /// [`Error::InvalidInput`] if any coordinate is NaN or infinite.
    pub fn new(points: &[Point3f]) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyInput(
                "cannot build a KD-tree from an empty point set".to_string(),
            ));
        }
        if let Some(index) = points.iter().position(|p| !is_finite_point(p)) {
            return Err(Error::InvalidInput(format!(
                "point {index} has a non-finite coordinate"
            )));
        }

        let mut tree = Self {
            points: points.to_vec(),
            indices: (0..points.len()).collect(),
            nodes: Vec::with_capacity(2 * points.len() / LEAF_SIZE + 1),
            root: 0,
        };
        let (root, depth) = tree.build(0, points.len());
        tree.root = root;

        debug!(
            points = points.len(),
            nodes = tree.nodes.len(),
            depth,
            "Built KD-tree"
        );
        Ok(tree)
    }

    /// Build a tree over the positions of `cloud`
    pub fn from_cloud(cloud: &PointCloud) -> Result<Self> {
        Self::new(cloud.points())
    }

    /// Builds the subtree over `indices[start..end]`, returning its node and depth
    fn build(&mut self, start: usize, end: usize) -> (usize, usize) {
        let count = end - start;
        if count <= LEAF_SIZE {
            return (self.push(Node::Leaf { start, end }), 1);
        }

        let (axis, extent) = self.widest_axis(start, end);
        // All points coincide; no split can separate them.
        if extent <= 0.0 {
            return (self.push(Node::Leaf { start, end }), 1);
        }

        let half = count / 2;
        let points = &self.points;
        self.indices[start..end]
            .select_nth_unstable_by(half, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
        let mid = start + half;
        let value = self.points[self.indices[mid]][axis];

        let node = self.push(Node::Leaf { start, end });
        let (left, left_depth) = self.build(start, mid);
        let (right, right_depth) = self.build(mid, end);
        self.nodes[node] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        (node, 1 + left_depth.max(right_depth))
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn widest_axis(&self, start: usize, end: usize) -> (usize, f32) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for &index in &self.indices[start..end] {
            let point = &self.points[index];
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis]);
                max[axis] = max[axis].max(point[axis]);
            }
        }

        (0..3)
            .map(|axis| (axis, max[axis] - min[axis]))
            .fold((0, f32::NEG_INFINITY), |widest, candidate| {
                if candidate.1 > widest.1 {
                    candidate
                } else {
                    widest
                }
            })
    }

    fn search_nearest(
        &self,
        node: usize,
        query: &Point3f,
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &index in &self.indices[start..end] {
                    let candidate = Candidate {
                        distance_squared: nalgebra::distance_squared(&self.points[index], query),
                        index,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search_nearest(near, query, k, heap);

                let must_visit = heap.len() < k
                    || heap
                        .peek()
                        .is_some_and(|worst| diff * diff <= worst.distance_squared);
                if must_visit {
                    self.search_nearest(far, query, k, heap);
                }
            }
        }
    }

    fn search_radius(
        &self,
        node: usize,
        query: &Point3f,
        radius_squared: f32,
        found: &mut Vec<Candidate>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                found.extend(self.indices[start..end].iter().filter_map(|&index| {
                    let distance_squared = nalgebra::distance_squared(&self.points[index], query);
                    (distance_squared <= radius_squared).then_some(Candidate {
                        distance_squared,
                        index,
                    })
                }));
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search_radius(near, query, radius_squared, found);
                if diff * diff <= radius_squared {
                    self.search_radius(far, query, radius_squared, found);
                }
            }
        }
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || !is_finite_point(query) {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k.min(self.points.len()) + 1);
        self.search_nearest(self.root, query, k, &mut heap);
        heap.into_sorted_vec()
            .into_iter()
            .map(Candidate::into_result)
            .collect()
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        if !(radius >= 0.0 && radius.is_finite()) || !is_finite_point(query) {
            return Vec::new();
        }

        let mut found = Vec::new();
        self.search_radius(self.root, query, radius * radius, &mut found);
        found.sort_unstable();
        found.into_iter().map(Candidate::into_result).collect()
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    fn candidates<'a>(&'a self, query: &'a Point3f) -> impl Iterator<Item = Candidate> + 'a {
        self.points
            .iter()
            .enumerate()
            .map(move |(index, point)| Candidate {
                distance_squared: nalgebra::distance_squared(point, query),
                index,
            })
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || !is_finite_point(query) {
            return Vec::new();
        }

        let mut distances: Vec<Candidate> = self.candidates(query).collect();
        distances.sort_unstable();
        distances.truncate(k);
        distances.into_iter().map(Candidate::into_result).collect()
    }

    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)> {
        if !(radius >= 0.0 && radius.is_finite()) || !is_finite_point(query) {
            return Vec::new();
        }

        let radius_squared = radius * radius;
        let mut found: Vec<Candidate> = self
            .candidates(query)
            .filter(|c| c.distance_squared <= radius_squared)
            .collect();
        found.sort_unstable();
        found.into_iter().map(Candidate::into_result).collect()
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}
