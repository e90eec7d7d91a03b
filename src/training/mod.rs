pub mod probe;
pub mod trainer;

use crate::error::{Result, SembError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Training loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Batch size for training and evaluation
    pub batch_size: usize,
    /// Learning rate passed to the model
    pub learning_rate: f64,
    /// Number of validation anchors probed per epoch
    pub probe_size: usize,
    /// Number of nearest reference samples listed per probed anchor
    pub probe_top_k: usize,
    /// Seed for the probe anchor selection
    pub probe_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 75,
            batch_size: 64,
            learning_rate: 0.01,
            probe_size: 10,
            probe_top_k: 10,
            probe_seed: 308,
        }
    }
}

impl TrainingConfig {
    /// Fail fast on unusable parameters.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(SembError::InvalidConfiguration(
                "epoch count must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SembError::InvalidConfiguration(
                "batch size must be at least 1".to_string(),
            ));
        }
        crate::utils::validation::positive(self.learning_rate, "learning rate")?;
        if self.probe_top_k == 0 {
            return Err(SembError::InvalidConfiguration(
                "probe top-k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Metrics for one completed epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub class_acc: f64,
    pub relation_acc: f64,
    pub val_loss: f64,
    pub val_class_acc: f64,
    pub val_relation_acc: f64,
}

/// Append-only per-epoch metric history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    records: Vec<EpochRecord>,
}

impl History {
    /// Append one epoch's record.
    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    /// Records in epoch order.
    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    /// Number of completed epochs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no epoch has completed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the history to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SembError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
