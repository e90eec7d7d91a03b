use crate::data::partition::{PairSet, Partition};
use crate::data::{LabelEncoder, SampleSet, UNLABELED};
use crate::error::{Result, SembError};
use crate::model::{BatchMetrics, PairModel};
use crate::training::probe::{EmbeddingProbe, ProbeAnchor};
use crate::training::{EpochRecord, History, TrainingConfig};
use crate::utils::format_duration;
use crate::utils::random::seeded_rng;
use rand::Rng;
use std::time::Instant;
use tracing::info;

/// Drives the epoch/batch loop against an external pair model.
///
/// Each epoch trains over contiguous batches, evaluates once over the
/// whole validation partition, runs the embedding probe over a fixed
/// random subset of validation anchors and appends one history record.
/// The epoch's training metrics are the last batch's figures, not a
/// full-epoch average. Any model failure aborts the run; epochs are
/// never retried.
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Validate the configuration and create a trainer.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the full training loop and return the metric history.
    pub fn train<M: PairModel>(
        &self,
        model: &mut M,
        partition: &Partition,
        reference: &SampleSet,
        encoder: &LabelEncoder,
    ) -> Result<History> {
        if partition.train.is_empty() {
            return Err(SembError::InsufficientData(
                "training partition is empty".to_string(),
            ));
        }
        if partition.val.is_empty() {
            return Err(SembError::InsufficientData(
                "validation partition is empty".to_string(),
            ));
        }

        let probe = EmbeddingProbe::new(self.config.probe_top_k);
        let probe_anchors = self.pick_probe_anchors(&partition.val, encoder);

        let n_train = partition.train.len();
        let batch_size = self.config.batch_size;
        let batch_ranges: Vec<(usize, usize)> = (0..n_train)
            .step_by(batch_size)
            .map(|start| (start, (start + batch_size).min(n_train)))
            .collect();

        info!(
            "Train on {} pairs, validate on {} pairs ({} batches/epoch)",
            n_train,
            partition.val.len(),
            batch_ranges.len()
        );

        let started = Instant::now();
        let mut history = History::default();

        for epoch in 0..self.config.epochs {
            info!("Epoch {}/{}", epoch + 1, self.config.epochs);

            let mut train_metrics = BatchMetrics::default();
            for &(start, end) in &batch_ranges {
                train_metrics = model.train_on_batch(&partition.train.batch(start..end))?;
            }

            let val_metrics = model.evaluate(&partition.val.full(), batch_size)?;

            info!(
                "- loss: {:.4} - class_acc: {:.4} - relation_acc: {:.4} \
                 - val_loss: {:.4} - val_class_acc: {:.4} - val_relation_acc: {:.4}",
                train_metrics.loss,
                train_metrics.class_accuracy,
                train_metrics.relation_accuracy,
                val_metrics.loss,
                val_metrics.class_accuracy,
                val_metrics.relation_accuracy
            );

            let report = probe.report(model, &probe_anchors, reference)?;
            info!("{}", report.trim_end());

            history.push(EpochRecord {
                epoch: epoch + 1,
                loss: train_metrics.loss,
                class_acc: train_metrics.class_accuracy,
                relation_acc: train_metrics.relation_accuracy,
                val_loss: val_metrics.loss,
                val_class_acc: val_metrics.class_accuracy,
                val_relation_acc: val_metrics.relation_accuracy,
            });
        }

        info!(
            "Training completed in {}",
            format_duration(started.elapsed().as_secs_f64())
        );
        Ok(history)
    }

    /// Fixed random subset of validation anchors, drawn once per run with
    /// replacement under the probe seed.
    fn pick_probe_anchors(&self, val: &PairSet, encoder: &LabelEncoder) -> Vec<ProbeAnchor> {
        let mut rng = seeded_rng(self.config.probe_seed);
        let count = self.config.probe_size.min(val.len());

        (0..count)
            .map(|_| {
                let i = rng.gen_range(0..val.len());
                let label = encoder
                    .decode_one_hot(&val.anchor_targets[i])
                    .unwrap_or(UNLABELED)
                    .to_string();
                ProbeAnchor {
                    id: val.anchor_ids[i].clone(),
                    features: val.anchor_features[i].clone(),
                    label,
                }
            })
            .collect()
    }
}

/// Per-class precision/recall/F1 summary over test-set predictions.
pub fn classification_report(
    predicted: &[usize],
    targets: &[Vec<f32>],
    encoder: &LabelEncoder,
) -> String {
    let n_classes = encoder.n_classes();
    let mut true_pos = vec![0usize; n_classes];
    let mut false_pos = vec![0usize; n_classes];
    let mut false_neg = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];
    let mut correct = 0usize;

    for (pred, target) in predicted.iter().zip(targets) {
        let actual = match encoder.index_of_one_hot(target) {
            Some(idx) => idx,
            None => continue,
        };
        support[actual] += 1;
        if *pred == actual {
            true_pos[actual] += 1;
            correct += 1;
        } else {
            false_neg[actual] += 1;
            if *pred < n_classes {
                false_pos[*pred] += 1;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:>9} {:>9} {:>9} {:>9}\n",
        "class", "precision", "recall", "f1", "support"
    ));
    for (i, class) in encoder.classes().iter().enumerate() {
        let tp = true_pos[i] as f64;
        let precision = if true_pos[i] + false_pos[i] > 0 {
            tp / (true_pos[i] + false_pos[i]) as f64
        } else {
            0.0
        };
        let recall = if support[i] > 0 {
            tp / support[i] as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        out.push_str(&format!(
            "{:<20} {:>9.4} {:>9.4} {:>9.4} {:>9}\n",
            class, precision, recall, f1, support[i]
        ));
    }

    let total: usize = support.iter().sum();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    out.push_str(&format!("accuracy: {:.4} ({} samples)\n", accuracy, total));
    out
}
