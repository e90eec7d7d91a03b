//! Exact k-nearest-neighbour search backed by a ball tree.
//!
//! The tree partitions points into nested balls (centroid + radius) so a
//! query can prune whole subtrees whose ball lies farther than the current
//! k-th best candidate. Results are exact; ties resolve to the lowest
//! point index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 16;

/// One search result: point index and Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lexicographic on (distance, index); the heap keeps the worst
        // candidate on top so lowest-index wins on equal distance.
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Node {
    start: usize,
    end: usize,
    centroid: Vec<f32>,
    radius: f32,
    children: Option<(usize, usize)>,
}

/// Ball tree over borrowed feature rows.
#[derive(Debug)]
pub struct BallTree<'a> {
    points: Vec<&'a [f32]>,
    indices: Vec<usize>,
    nodes: Vec<Node>,
    root: usize,
}

impl<'a> BallTree<'a> {
    /// Build a tree over the given points. Panics on an empty input.
    pub fn build(points: Vec<&'a [f32]>) -> Self {
        assert!(!points.is_empty(), "ball tree requires at least one point");
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::new();
        let end = indices.len();
        let root = build_node(&points, &mut indices, 0, end, &mut nodes);
        Self {
            points,
            indices,
            nodes,
            root,
        }
    }

    /// The k nearest points to `query`, ascending by (distance, index).
    ///
    /// Returns fewer than k results only when the tree holds fewer points.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        if k > 0 {
            self.search(self.root, query, k, &mut heap);
        }
        let mut result = heap.into_vec();
        result.sort_unstable();
        result
    }

    fn search(&self, node_id: usize, query: &[f32], k: usize, heap: &mut BinaryHeap<Neighbor>) {
        let node = &self.nodes[node_id];
        let dist_to_centroid = euclidean(query, &node.centroid);

        if heap.len() == k {
            let bound = heap
                .peek()
                .map(|worst| worst.distance)
                .unwrap_or(f32::INFINITY);
            if dist_to_centroid - node.radius > bound {
                return;
            }
        }

        match node.children {
            None => {
                for &idx in &self.indices[node.start..node.end] {
                    let candidate = Neighbor {
                        index: idx,
                        distance: euclidean(query, self.points[idx]),
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if let Some(worst) = heap.peek() {
                        if candidate < *worst {
                            heap.pop();
                            heap.push(candidate);
                        }
                    }
                }
            }
            Some((left, right)) => {
                // Descend into the closer ball first to tighten the bound early
                let dl = euclidean(query, &self.nodes[left].centroid);
                let dr = euclidean(query, &self.nodes[right].centroid);
                let (first, second) = if dl <= dr { (left, right) } else { (right, left) };
                self.search(first, query, k, heap);
                self.search(second, query, k, heap);
            }
        }
    }
}

fn build_node(
    points: &[&[f32]],
    indices: &mut [usize],
    start: usize,
    end: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let dim = points[indices[start]].len();

    let mut centroid = vec![0.0f32; dim];
    for &idx in &indices[start..end] {
        for (c, v) in centroid.iter_mut().zip(points[idx]) {
            *c += v;
        }
    }
    let count = (end - start) as f32;
    for c in centroid.iter_mut() {
        *c /= count;
    }

    let radius = indices[start..end]
        .iter()
        .map(|&idx| euclidean(&centroid, points[idx]))
        .fold(0.0f32, f32::max);

    if end - start <= LEAF_SIZE {
        nodes.push(Node {
            start,
            end,
            centroid,
            radius,
            children: None,
        });
        return nodes.len() - 1;
    }

    // Split on the dimension with the widest spread
    let mut split_dim = 0;
    let mut best_spread = f32::NEG_INFINITY;
    for d in 0..dim {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for &idx in &indices[start..end] {
            let v = points[idx][d];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        let spread = hi - lo;
        if spread > best_spread {
            best_spread = spread;
            split_dim = d;
        }
    }

    indices[start..end].sort_unstable_by(|&a, &b| {
        points[a][split_dim]
            .total_cmp(&points[b][split_dim])
            .then(a.cmp(&b))
    });

    let mid = start + (end - start) / 2;
    let left = build_node(points, indices, start, mid, nodes);
    let right = build_node(points, indices, mid, end, nodes);

    nodes.push(Node {
        start,
        end,
        centroid,
        radius,
        children: Some((left, right)),
    });
    nodes.len() - 1
}

/// Euclidean distance between two vectors of equal length.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
