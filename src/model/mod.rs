pub mod architecture;

use crate::data::partition::PairBatch;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scalar metrics reported by a single model operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Combined loss over both output heads
    pub loss: f64,
    /// Accuracy of the anchor class head
    pub class_accuracy: f64,
    /// Accuracy of the relation head
    pub relation_accuracy: f64,
}

/// Class and relation predictions for a set of pairs.
#[derive(Debug, Clone)]
pub struct Predictions {
    /// Predicted class index per anchor
    pub classes: Vec<usize>,
    /// Relation score in [0, 1] per pair
    pub relation_scores: Vec<f32>,
}

/// Capability interface of the external pair-scoring model.
///
/// The pipeline core only depends on this trait; the concrete network
/// topology behind it is interchangeable. Failures must carry the failing
/// stage and are never retried by the caller.
pub trait PairModel {
    /// One gradient step on a batch of pairs.
    fn train_on_batch(&mut self, batch: &PairBatch<'_>) -> Result<BatchMetrics>;

    /// Loss and accuracies over a full set, processed in chunks of
    /// `batch_size`.
    fn evaluate(&self, batch: &PairBatch<'_>, batch_size: usize) -> Result<BatchMetrics>;

    /// Class and relation predictions for aligned anchor/context rows.
    fn predict(
        &self,
        anchors: &[Vec<f32>],
        contexts: &[Vec<f32>],
        batch_size: usize,
    ) -> Result<Predictions>;

    /// Scalar similarity score for one anchor/context pair.
    fn pair_score(&self, anchor: &[f32], context: &[f32]) -> Result<f32>;

    /// Persist model metadata to disk.
    fn persist(&self, path: &Path) -> Result<()>;
}

/// Network dimensions and initialization seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of input features (genes)
    pub input_size: usize,
    /// Number of anchor classes, unlabeled sentinel included
    pub n_classes: usize,
    /// First hidden layer width
    pub hidden_size_1: usize,
    /// Second hidden layer width
    pub hidden_size_2: usize,
    /// Embedding width shared by both branches
    pub embedding_size: usize,
    /// Dropout rate applied between hidden layers
    pub dropout: f64,
    /// Parameter initialization seed
    pub seed: u64,
}

impl ModelConfig {
    /// Configuration for the given input and class counts with default
    /// layer sizes.
    pub fn new(input_size: usize, n_classes: usize) -> Self {
        Self {
            input_size,
            n_classes,
            hidden_size_1: 256,
            hidden_size_2: 128,
            embedding_size: 64,
            dropout: 0.3,
            seed: 42,
        }
    }

    /// Set the dropout rate.
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Set the initialization seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
