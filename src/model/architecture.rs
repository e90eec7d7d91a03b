use crate::data::partition::PairBatch;
use crate::error::{ModelStage, Result, SembError};
use crate::model::{BatchMetrics, ModelConfig, PairModel, Predictions};
use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{BinaryCrossEntropyLossConfig, CrossEntropyLossConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use std::path::Path;

/// Dual-branch embedding network.
///
/// Anchor and context share one embedding MLP; the relation score is the
/// dot product of the two embeddings and the class head reads the anchor
/// embedding alone.
#[derive(Module, Debug)]
pub struct GraphSemiNet<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    proj: Linear<B>,
    class_head: Linear<B>,
    dropout: Dropout,
}

/// Raw head outputs for one batch of pairs.
#[derive(Debug)]
pub struct PairOutput<B: Backend> {
    /// Class logits per anchor, [batch, n_classes]
    pub class_logits: Tensor<B, 2>,
    /// Relation logits per pair, [batch]
    pub relation_logits: Tensor<B, 1>,
}

impl<B: Backend> GraphSemiNet<B> {
    /// Embed one side of a pair.
    pub fn embed(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(input);
        let x = relu(x);
        let x = self.dropout.forward(x);

        let x = self.fc2.forward(x);
        let x = relu(x);
        let x = self.dropout.forward(x);

        self.proj.forward(x)
    }

    /// Forward both branches.
    pub fn forward(&self, anchors: Tensor<B, 2>, contexts: Tensor<B, 2>) -> PairOutput<B> {
        let anchor_embed = self.embed(anchors);
        let context_embed = self.embed(contexts);

        let scores = (anchor_embed.clone() * context_embed).sum_dim(1);
        let relation_logits: Tensor<B, 1> = scores.squeeze(1);
        let class_logits = self.class_head.forward(anchor_embed);

        PairOutput {
            class_logits,
            relation_logits,
        }
    }
}

/// Initialize the network from a configuration.
pub fn init_net<B: Backend>(config: &ModelConfig, device: &B::Device) -> GraphSemiNet<B> {
    let fc1 = LinearConfig::new(config.input_size, config.hidden_size_1)
        .with_bias(true)
        .init(device);
    let fc2 = LinearConfig::new(config.hidden_size_1, config.hidden_size_2)
        .with_bias(true)
        .init(device);
    let proj = LinearConfig::new(config.hidden_size_2, config.embedding_size)
        .with_bias(true)
        .init(device);
    let class_head = LinearConfig::new(config.embedding_size, config.n_classes)
        .with_bias(true)
        .init(device);
    let dropout = DropoutConfig::new(config.dropout).init();

    GraphSemiNet {
        fc1,
        fc2,
        proj,
        class_head,
        dropout,
    }
}

/// Trainable pair model over an autodiff-wrapped backend.
pub struct SemiModel<B: Backend> {
    net: GraphSemiNet<Autodiff<B>>,
    config: ModelConfig,
    device: B::Device,
    optim: SgdConfig,
    learning_rate: f64,
}

impl<B: Backend> SemiModel<B> {
    /// Seed the backend and initialize the network.
    pub fn new(config: ModelConfig, learning_rate: f64, device: B::Device) -> Self {
        Autodiff::<B>::seed(config.seed);
        let net = init_net::<Autodiff<B>>(&config, &device);
        Self {
            net,
            config,
            device,
            optim: SgdConfig::new(),
            learning_rate,
        }
    }

    /// Network configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn check_batch(&self, batch: &PairBatch<'_>, stage: ModelStage) -> Result<()> {
        if batch.is_empty() {
            return Err(SembError::model(stage, "empty batch"));
        }
        for rows in [batch.anchor_features, batch.context_features] {
            if rows.iter().any(|r| r.len() != self.config.input_size) {
                return Err(SembError::model(
                    stage,
                    format!(
                        "feature rows must have {} values",
                        self.config.input_size
                    ),
                ));
            }
        }
        if batch.anchor_targets.len() != batch.len() || batch.relation_targets.len() != batch.len()
        {
            return Err(SembError::model(stage, "misaligned target arrays"));
        }
        Ok(())
    }
}

impl<B: Backend> PairModel for SemiModel<B> {
    fn train_on_batch(&mut self, batch: &PairBatch<'_>) -> Result<BatchMetrics> {
        self.check_batch(batch, ModelStage::Train)?;

        let (loss, metrics) =
            forward_loss(&self.net, batch, self.config.input_size, &self.device);
        let grads = GradientsParams::from_grads(loss.backward(), &self.net);
        // Plain SGD carries no state between steps, so the optimizer is
        // rebuilt per batch
        let mut optim = self.optim.init();
        self.net = optim.step(self.learning_rate, self.net.clone(), grads);

        Ok(metrics)
    }

    fn evaluate(&self, batch: &PairBatch<'_>, batch_size: usize) -> Result<BatchMetrics> {
        self.check_batch(batch, ModelStage::Evaluate)?;

        let net = self.net.valid();
        let step = batch_size.max(1);
        let total = batch.len();

        let mut loss = 0.0;
        let mut class_acc = 0.0;
        let mut relation_acc = 0.0;
        let mut start = 0;
        while start < total {
            let end = (start + step).min(total);
            let chunk = PairBatch {
                anchor_features: &batch.anchor_features[start..end],
                context_features: &batch.context_features[start..end],
                anchor_targets: &batch.anchor_targets[start..end],
                relation_targets: &batch.relation_targets[start..end],
            };
            let (_, metrics) = forward_loss(&net, &chunk, self.config.input_size, &self.device);
            let weight = (end - start) as f64;
            loss += metrics.loss * weight;
            class_acc += metrics.class_accuracy * weight;
            relation_acc += metrics.relation_accuracy * weight;
            start = end;
        }

        let n = total as f64;
        Ok(BatchMetrics {
            loss: loss / n,
            class_accuracy: class_acc / n,
            relation_accuracy: relation_acc / n,
        })
    }

    fn predict(
        &self,
        anchors: &[Vec<f32>],
        contexts: &[Vec<f32>],
        batch_size: usize,
    ) -> Result<Predictions> {
        if anchors.len() != contexts.len() {
            return Err(SembError::model(
                ModelStage::Predict,
                "anchor and context sets differ in length",
            ));
        }

        let net = self.net.valid();
        let step = batch_size.max(1);
        let mut classes = Vec::with_capacity(anchors.len());
        let mut relation_scores = Vec::with_capacity(anchors.len());

        let mut start = 0;
        while start < anchors.len() {
            let end = (start + step).min(anchors.len());
            let anchor_t =
                features_tensor::<B>(&anchors[start..end], self.config.input_size, &self.device);
            let context_t =
                features_tensor::<B>(&contexts[start..end], self.config.input_size, &self.device);
            let output = net.forward(anchor_t, context_t);

            let class_idx: Tensor<B, 1, Int> = output.class_logits.argmax(1).squeeze(1);
            let idx: Vec<i64> = class_idx
                .into_data()
                .convert::<i64>()
                .to_vec()
                .map_err(|e| SembError::model(ModelStage::Predict, format!("{:?}", e)))?;
            classes.extend(idx.into_iter().map(|v| v as usize));

            let scores: Vec<f32> = sigmoid(output.relation_logits)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| SembError::model(ModelStage::Predict, format!("{:?}", e)))?;
            relation_scores.extend(scores);

            start = end;
        }

        Ok(Predictions {
            classes,
            relation_scores,
        })
    }

    fn pair_score(&self, anchor: &[f32], context: &[f32]) -> Result<f32> {
        if anchor.len() != self.config.input_size || context.len() != self.config.input_size {
            return Err(SembError::model(
                ModelStage::Predict,
                format!("pair vectors must have {} values", self.config.input_size),
            ));
        }

        let net = self.net.valid();
        let anchor_t = Tensor::<B, 1>::from_floats(anchor, &self.device)
            .reshape([1, self.config.input_size]);
        let context_t = Tensor::<B, 1>::from_floats(context, &self.device)
            .reshape([1, self.config.input_size]);
        let output = net.forward(anchor_t, context_t);
        let score: f32 = sigmoid(output.relation_logits).into_scalar().elem();
        Ok(score)
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| SembError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Forward a batch and compute the combined loss plus scalar metrics.
fn forward_loss<BE: Backend>(
    net: &GraphSemiNet<BE>,
    batch: &PairBatch<'_>,
    n_features: usize,
    device: &BE::Device,
) -> (Tensor<BE, 1>, BatchMetrics) {
    let anchors = features_tensor::<BE>(batch.anchor_features, n_features, device);
    let contexts = features_tensor::<BE>(batch.context_features, n_features, device);
    let class_targets = class_index_tensor::<BE>(batch.anchor_targets, device);
    let relation_targets = relation_tensor::<BE>(batch.relation_targets, device);

    let output = net.forward(anchors, contexts);

    let class_loss = CrossEntropyLossConfig::new()
        .init(device)
        .forward(output.class_logits.clone(), class_targets.clone());
    let relation_loss = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device)
        .forward(output.relation_logits.clone(), relation_targets.clone());
    let loss = class_loss + relation_loss;

    let class_pred: Tensor<BE, 1, Int> = output.class_logits.argmax(1).squeeze(1);
    let relation_pred = sigmoid(output.relation_logits).greater_elem(0.5).int();

    let metrics = BatchMetrics {
        loss: loss.clone().into_scalar().elem::<f64>(),
        class_accuracy: accuracy(class_pred, class_targets),
        relation_accuracy: accuracy(relation_pred, relation_targets),
    };
    (loss, metrics)
}

fn features_tensor<BE: Backend>(
    rows: &[Vec<f32>],
    n_features: usize,
    device: &BE::Device,
) -> Tensor<BE, 2> {
    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for row in rows {
        flat.extend_from_slice(row);
    }
    Tensor::<BE, 1>::from_floats(flat.as_slice(), device).reshape([rows.len(), n_features])
}

fn class_index_tensor<BE: Backend>(
    targets: &[Vec<f32>],
    device: &BE::Device,
) -> Tensor<BE, 1, Int> {
    let indices: Vec<i32> = targets.iter().map(|row| one_hot_index(row) as i32).collect();
    Tensor::<BE, 1, Int>::from_ints(indices.as_slice(), device)
}

fn relation_tensor<BE: Backend>(targets: &[f32], device: &BE::Device) -> Tensor<BE, 1, Int> {
    let bits: Vec<i32> = targets.iter().map(|v| i32::from(*v >= 0.5)).collect();
    Tensor::<BE, 1, Int>::from_ints(bits.as_slice(), device)
}

/// Index of the first maximum in a one-hot (or all-zero) row.
fn one_hot_index(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

fn accuracy<BE: Backend>(predictions: Tensor<BE, 1, Int>, targets: Tensor<BE, 1, Int>) -> f64 {
    let total = targets.dims()[0] as f64;
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as f64 / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_batch() -> (Vec<Vec<f32>>, Vec<Vec<f32>>, Vec<Vec<f32>>, Vec<f32>) {
        let anchors = vec![vec![0.5, -0.5, 1.0, 0.0], vec![1.0, 1.0, -1.0, 0.5]];
        let contexts = vec![vec![0.4, -0.4, 0.9, 0.1], vec![-1.0, 0.0, 1.0, -0.5]];
        let targets = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let relations = vec![1.0, 0.0];
        (anchors, contexts, targets, relations)
    }

    fn tiny_model() -> SemiModel<TestBackend> {
        let config = ModelConfig {
            input_size: 4,
            n_classes: 3,
            hidden_size_1: 8,
            hidden_size_2: 8,
            embedding_size: 4,
            dropout: 0.0,
            seed: 42,
        };
        SemiModel::new(config, 0.05, Default::default())
    }

    #[test]
    fn test_train_on_batch_reports_finite_metrics() {
        let mut model = tiny_model();
        let (anchors, contexts, targets, relations) = tiny_batch();
        let batch = PairBatch {
            anchor_features: &anchors,
            context_features: &contexts,
            anchor_targets: &targets,
            relation_targets: &relations,
        };

        let metrics = model.train_on_batch(&batch).unwrap();
        assert!(metrics.loss.is_finite());
        assert!((0.0..=1.0).contains(&metrics.class_accuracy));
        assert!((0.0..=1.0).contains(&metrics.relation_accuracy));
    }

    #[test]
    fn test_evaluate_matches_batch_shape() {
        let model = tiny_model();
        let (anchors, contexts, targets, relations) = tiny_batch();
        let batch = PairBatch {
            anchor_features: &anchors,
            context_features: &contexts,
            anchor_targets: &targets,
            relation_targets: &relations,
        };

        let metrics = model.evaluate(&batch, 1).unwrap();
        assert!(metrics.loss.is_finite());
    }

    #[test]
    fn test_predict_shapes() {
        let model = tiny_model();
        let (anchors, contexts, _, _) = tiny_batch();

        let predictions = model.predict(&anchors, &contexts, 64).unwrap();
        assert_eq!(predictions.classes.len(), 2);
        assert_eq!(predictions.relation_scores.len(), 2);
        assert!(predictions.classes.iter().all(|&c| c < 3));
        assert!(predictions
            .relation_scores
            .iter()
            .all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_pair_score_in_unit_interval() {
        let model = tiny_model();
        let score = model
            .pair_score(&[0.1, 0.2, 0.3, 0.4], &[0.4, 0.3, 0.2, 0.1])
            .unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_rejects_wrong_width_rows() {
        let mut model = tiny_model();
        let anchors = vec![vec![1.0, 2.0]];
        let contexts = vec![vec![1.0, 2.0]];
        let targets = vec![vec![1.0, 0.0, 0.0]];
        let relations = vec![1.0];
        let batch = PairBatch {
            anchor_features: &anchors,
            context_features: &contexts,
            anchor_targets: &targets,
            relation_targets: &relations,
        };
        assert!(model.train_on_batch(&batch).is_err());
    }

    #[test]
    fn test_one_hot_index() {
        assert_eq!(one_hot_index(&[0.0, 1.0, 0.0]), 1);
        assert_eq!(one_hot_index(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(one_hot_index(&[0.2, 0.9, 0.9]), 1);
    }
}
