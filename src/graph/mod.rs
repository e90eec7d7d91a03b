pub mod balltree;

use crate::data::SampleSet;
use crate::error::{Result, SembError};
use self::balltree::BallTree;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// k-NN graph construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Number of nearest neighbours per sample
    pub neighbors: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { neighbors: 2 }
    }
}

impl GraphConfig {
    /// Fail with `InvalidConfiguration` unless 1 <= k < n.
    pub fn validate(&self, n_samples: usize) -> Result<()> {
        if self.neighbors < 1 {
            return Err(SembError::InvalidConfiguration(
                "neighbor count must be at least 1".to_string(),
            ));
        }
        if self.neighbors >= n_samples {
            return Err(SembError::InvalidConfiguration(format!(
                "neighbor count {} must be smaller than the sample count {}",
                self.neighbors, n_samples
            )));
        }
        Ok(())
    }
}

/// One outgoing edge of the similarity graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    /// Index of the neighbouring sample
    pub target: usize,
    /// Euclidean distance to the neighbour
    pub distance: f32,
}

/// Sparse k-nearest-neighbour distance graph.
///
/// Row i holds sample i's k nearest neighbours sorted by ascending
/// distance (ties by lowest index); the diagonal is excluded. Storage is
/// O(N·k) — the dense N×N form is never materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityGraph {
    rows: Vec<Vec<GraphEdge>>,
}

impl SimilarityGraph {
    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Neighbours of sample i, nearest first.
    pub fn neighbors(&self, i: usize) -> &[GraphEdge] {
        &self.rows[i]
    }

    /// Realized degree of row i.
    pub fn degree(&self, i: usize) -> usize {
        self.rows[i].len()
    }
}

/// Build the k-NN similarity graph over all samples.
///
/// The blocking tree construction and queries run on a worker thread so
/// the progress indicator can keep ticking; the caller blocks until the
/// worker finishes and returns its single result.
pub fn build(samples: &SampleSet, config: &GraphConfig) -> Result<SimilarityGraph> {
    config.validate(samples.len())?;

    info!(
        "Building {}-NN graph over {} samples",
        config.neighbors,
        samples.len()
    );

    let k = config.neighbors;
    let rows = std::thread::scope(|scope| {
        let worker = scope.spawn(move || knn_rows(samples, k));

        let progress = ProgressBar::new_spinner();
        progress.set_message("computing k-nearest neighbors");
        while !worker.is_finished() {
            progress.tick();
            std::thread::sleep(Duration::from_millis(100));
        }
        progress.finish_and_clear();

        match worker.join() {
            Ok(rows) => rows,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    Ok(SimilarityGraph { rows })
}

/// Exact k-NN rows for every sample, self-matches excluded.
fn knn_rows(samples: &SampleSet, k: usize) -> Vec<Vec<GraphEdge>> {
    let points: Vec<&[f32]> = (0..samples.len()).map(|i| samples.features(i)).collect();
    let tree = BallTree::build(points);

    (0..samples.len())
        .map(|i| {
            // Query one extra so the self-match can be dropped
            tree.query(samples.features(i), k + 1)
                .into_iter()
                .filter(|n| n.index != i)
                .take(k)
                .map(|n| GraphEdge {
                    target: n.index,
                    distance: n.distance,
                })
                .collect()
        })
        .collect()
}
