pub mod loader;
pub mod partition;

use crate::error::{Result, SembError};
use serde::{Deserialize, Serialize};

/// Sentinel label value for samples without an annotation.
///
/// Kept as a real category: the label encoder treats it as one of the
/// classes, so every sample gets a proper one-hot target row.
pub const UNLABELED: &str = "unlabeled";

/// A single expression sample: one vector of per-gene values plus an
/// optional categorical label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Sample identifier, unique within a set
    pub id: String,
    /// Expression values, one per gene, fixed length across the set
    pub features: Vec<f32>,
    /// Class label; `None` means unlabeled
    pub label: Option<String>,
}

impl Sample {
    /// Create a new sample.
    pub fn new(id: impl Into<String>, features: Vec<f32>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            features,
            label,
        }
    }

    /// Label string with the unlabeled sentinel substituted.
    pub fn label_or_sentinel(&self) -> &str {
        self.label.as_deref().unwrap_or(UNLABELED)
    }
}

/// Ordered, read-only collection of samples.
///
/// The positional index 0..N-1 is the canonical identity used by the graph
/// and the pair sampler; string ids are kept for reporting only.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Sample>,
    n_features: usize,
}

impl SampleSet {
    /// Build a set from samples, validating uniform feature length.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let n_features = match samples.first() {
            Some(s) => s.features.len(),
            None => {
                return Err(SembError::InsufficientData(
                    "sample set is empty".to_string(),
                ))
            }
        };

        for sample in &samples {
            if sample.features.len() != n_features {
                return Err(SembError::Parse(format!(
                    "sample {} has {} features, expected {}",
                    sample.id,
                    sample.features.len(),
                    n_features
                )));
            }
        }

        Ok(Self {
            samples,
            n_features,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Feature vector length.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Sample at a positional index.
    pub fn get(&self, index: usize) -> &Sample {
        &self.samples[index]
    }

    /// Feature row at a positional index.
    pub fn features(&self, index: usize) -> &[f32] {
        &self.samples[index].features
    }

    /// Label at a positional index, `None` for unlabeled.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.samples[index].label.as_deref()
    }

    /// Iterate over samples in positional order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Number of samples carrying a real label.
    pub fn labeled_count(&self) -> usize {
        self.samples.iter().filter(|s| s.label.is_some()).count()
    }
}

/// One-hot label encoder over the label values observed in a sample set.
///
/// The unlabeled sentinel is fit as a class of its own, matching the
/// behaviour of binarizing the raw label column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit the encoder on every label value in the set, sentinel included.
    pub fn fit(samples: &SampleSet) -> Self {
        let mut classes: Vec<String> = samples
            .iter()
            .map(|s| s.label_or_sentinel().to_string())
            .collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Ordered class names.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Index of a label value, if it was seen at fit time.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    /// One-hot encode a label; an unseen value yields an all-zero row.
    pub fn transform(&self, label: &str) -> Vec<f32> {
        let mut row = vec![0.0; self.classes.len()];
        if let Some(idx) = self.index_of(label) {
            row[idx] = 1.0;
        }
        row
    }

    /// Class name for an index.
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(|s| s.as_str())
    }

    /// Class index for a one-hot row; `None` for an all-zero row.
    pub fn index_of_one_hot(&self, row: &[f32]) -> Option<usize> {
        row.iter().position(|v| *v == 1.0)
    }

    /// Class name for a one-hot row.
    pub fn decode_one_hot(&self, row: &[f32]) -> Option<&str> {
        self.index_of_one_hot(row).and_then(|i| self.decode(i))
    }
}

/// Train/validation portion specification; the remainder is test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortionConfig {
    /// Training set portion
    pub train: f64,
    /// Validation set portion
    pub val: f64,
    /// Seed for the split permutation
    pub seed: u64,
}

impl Default for PortionConfig {
    fn default() -> Self {
        Self {
            train: 0.6,
            val: 0.2,
            seed: 33,
        }
    }
}

impl PortionConfig {
    /// Fail with `InvalidConfiguration` unless both portions are in [0, 1]
    /// and sum to at most 1.
    pub fn validate(&self) -> Result<()> {
        crate::utils::validation::in_range(self.train, 0.0, 1.0, "train portion")?;
        crate::utils::validation::in_range(self.val, 0.0, 1.0, "val portion")?;
        if self.train + self.val > 1.0 {
            return Err(SembError::InvalidConfiguration(format!(
                "train + val portions must not exceed 1, got {}",
                self.train + self.val
            )));
        }
        Ok(())
    }
}
