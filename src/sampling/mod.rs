//! Anchor/context pair sampling over the similarity graph and the label
//! assignment.
//!
//! Every draw picks a uniform random anchor, then resolves the context
//! either from the anchor's nearest graph neighbours (weighted by a
//! quantized inverse-distance score, closer is likelier) or from the label
//! index (same-class partner or a differently-labelled sample). The mix
//! between the two strategies is governed by the relative weights r1/r2.
//! Draws are fully deterministic for a fixed seed.

use crate::data::SampleSet;
use crate::error::{Result, SembError};
use crate::graph::{GraphEdge, SimilarityGraph};
use crate::utils::random::seeded_rng;
use crate::utils::validation;
use indicatif::ProgressBar;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Probability that a label-context draw for a labelled anchor targets the
/// anchor's own class rather than a different one.
const SAME_LABEL_PROB: f64 = 0.5;

/// Relation signal attached to a sampled pair, distinct from either
/// sample's own class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// Same-class partner or near graph neighbour
    Similar,
    /// Different-class or unlabeled partner
    Dissimilar,
}

impl Relation {
    /// Binary training target for the relation head.
    pub fn target(&self) -> f32 {
        match self {
            Relation::Similar => 1.0,
            Relation::Dissimilar => 0.0,
        }
    }
}

/// One sampled training pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    /// Anchor sample index
    pub anchor: usize,
    /// Context sample index, never equal to the anchor
    pub context: usize,
    /// Derived relation signal
    pub relation: Relation,
}

/// Pair sampling parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of triples to draw
    pub size: usize,
    /// Relative weight of graph-context draws (r1)
    pub graph_weight: f64,
    /// Relative weight of label-context draws (r2)
    pub label_weight: f64,
    /// Resolution levels for the inverse-distance weighting (q)
    pub quantization: u32,
    /// Number of nearest graph neighbours a graph draw chooses from (d)
    pub max_neighbors: usize,
    /// Seed for the sampling generator
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            size: 10_000,
            graph_weight: 0.5,
            label_weight: 0.5,
            quantization: 100,
            max_neighbors: 10,
            seed: 123,
        }
    }
}

impl SamplerConfig {
    /// Fail fast on out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(SembError::InvalidConfiguration(
                "sample size must be at least 1".to_string(),
            ));
        }
        validation::in_range(self.graph_weight, 0.0, 1.0, "graph weight")?;
        validation::in_range(self.label_weight, 0.0, 1.0, "label weight")?;
        if self.graph_weight + self.label_weight <= 0.0 {
            return Err(SembError::InvalidConfiguration(
                "graph and label weights must not both be zero".to_string(),
            ));
        }
        if self.quantization == 0 {
            return Err(SembError::InvalidConfiguration(
                "quantization must be at least 1".to_string(),
            ));
        }
        if self.max_neighbors == 0 {
            return Err(SembError::InvalidConfiguration(
                "neighbor draw bound must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sample indices grouped by label value, unlabeled samples kept apart.
///
/// Class sets are disjoint and iterate in deterministic (sorted) order,
/// which the dissimilar draw relies on for reproducibility.
#[derive(Debug, Clone)]
pub struct LabelPairIndex {
    classes: BTreeMap<String, Vec<usize>>,
    unlabeled: Vec<usize>,
    labeled_total: usize,
}

impl LabelPairIndex {
    /// Build the index over a sample set.
    pub fn build(samples: &SampleSet) -> Self {
        let mut classes: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut unlabeled = Vec::new();
        for (i, sample) in samples.iter().enumerate() {
            match &sample.label {
                Some(label) => classes.entry(label.clone()).or_default().push(i),
                None => unlabeled.push(i),
            }
        }
        let labeled_total = classes.values().map(|m| m.len()).sum();
        Self {
            classes,
            unlabeled,
            labeled_total,
        }
    }

    /// Members of a label class, ascending by index.
    pub fn members(&self, label: &str) -> Option<&[usize]> {
        self.classes.get(label).map(|m| m.as_slice())
    }

    /// Number of distinct label classes.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Total number of labelled samples.
    pub fn labeled_total(&self) -> usize {
        self.labeled_total
    }

    /// Unlabeled sample indices, ascending.
    pub fn unlabeled(&self) -> &[usize] {
        &self.unlabeled
    }
}

/// Draws (anchor, context, relation) triples from the graph and the label
/// index under the configured strategy mix.
pub struct PairSampler<'a> {
    graph: &'a SimilarityGraph,
    samples: &'a SampleSet,
    index: &'a LabelPairIndex,
    config: SamplerConfig,
}

impl<'a> PairSampler<'a> {
    /// Validate the configuration and the label pools the policy will need.
    ///
    /// When label draws are enabled (r2 > 0) the pools a draw could require
    /// must be non-empty up front: a labelled anchor needs a second label
    /// class for its dissimilar draw, and an unlabeled anchor needs an
    /// unlabeled partner. Failing here keeps the per-draw behaviour free of
    /// silent fallbacks.
    pub fn new(
        graph: &'a SimilarityGraph,
        samples: &'a SampleSet,
        index: &'a LabelPairIndex,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if graph.n_samples() != samples.len() {
            return Err(SembError::InvalidConfiguration(format!(
                "graph covers {} samples but the set holds {}",
                graph.n_samples(),
                samples.len()
            )));
        }

        if config.label_weight > 0.0 {
            if index.labeled_total() > 0 && index.n_classes() < 2 {
                return Err(SembError::InsufficientData(
                    "label-context draws require at least two label classes".to_string(),
                ));
            }
            if index.unlabeled().len() == 1 {
                return Err(SembError::InsufficientData(
                    "a single unlabeled sample has no unlabeled partner for label-context draws"
                        .to_string(),
                ));
            }
        }

        Ok(Self {
            graph,
            samples,
            index,
            config,
        })
    }

    /// Draw the configured number of triples from a generator seeded with
    /// the configured seed. Identical inputs and seed produce an identical
    /// sequence.
    pub fn sample_set(&self) -> Result<Vec<Triple>> {
        info!(
            "Sampling {} pairs (r1={}, r2={}, q={}, d={})",
            self.config.size,
            self.config.graph_weight,
            self.config.label_weight,
            self.config.quantization,
            self.config.max_neighbors
        );

        let mut rng = seeded_rng(self.config.seed);
        let progress = ProgressBar::new(self.config.size as u64);
        let mut triples = Vec::with_capacity(self.config.size);
        for _ in 0..self.config.size {
            triples.push(self.draw(&mut rng)?);
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(triples)
    }

    /// One draw from an externally managed generator.
    pub fn draw(&self, rng: &mut ChaCha8Rng) -> Result<Triple> {
        let anchor = rng.gen_range(0..self.samples.len());
        let p_graph = self.config.graph_weight / (self.config.graph_weight + self.config.label_weight);
        if rng.gen_bool(p_graph) {
            self.graph_context(anchor, rng)
        } else {
            self.label_context(anchor, rng)
        }
    }

    /// Context from the anchor's d nearest graph neighbours, weighted by
    /// quantized inverse distance. Near-neighbour pairs are similar.
    fn graph_context(&self, anchor: usize, rng: &mut ChaCha8Rng) -> Result<Triple> {
        let row = self.graph.neighbors(anchor);
        let bound = self.config.max_neighbors;
        if row.len() < bound {
            return Err(SembError::InsufficientData(format!(
                "sample {} has {} graph neighbors but the draw bound is {}",
                anchor,
                row.len(),
                bound
            )));
        }

        let candidates = &row[..bound];
        let weights = quantized_weights(candidates, self.config.quantization);
        let total: u64 = weights.iter().sum();

        let mut ticket = rng.gen_range(0..total);
        let mut chosen = candidates[candidates.len() - 1].target;
        for (edge, weight) in candidates.iter().zip(&weights) {
            if ticket < *weight {
                chosen = edge.target;
                break;
            }
            ticket -= weight;
        }

        Ok(Triple {
            anchor,
            context: chosen,
            relation: Relation::Similar,
        })
    }

    /// Context from the label index. Labelled anchors flip between a
    /// same-class partner and a differently-labelled one; a singleton class
    /// has no partner and takes the dissimilar path. Unlabeled anchors pair
    /// with another unlabeled sample.
    fn label_context(&self, anchor: usize, rng: &mut ChaCha8Rng) -> Result<Triple> {
        match self.samples.label(anchor) {
            Some(label) => {
                if rng.gen_bool(SAME_LABEL_PROB) {
                    if let Some(context) = self.same_label_partner(anchor, label, rng) {
                        return Ok(Triple {
                            anchor,
                            context,
                            relation: Relation::Similar,
                        });
                    }
                }
                self.different_label_context(anchor, label, rng)
            }
            None => self.unlabeled_context(anchor, rng),
        }
    }

    /// Uniform pick from the anchor's class excluding the anchor itself;
    /// `None` when the class is a singleton.
    fn same_label_partner(&self, anchor: usize, label: &str, rng: &mut ChaCha8Rng) -> Option<usize> {
        let pool = self.index.members(label)?;
        if pool.len() < 2 {
            return None;
        }
        let ticket = rng.gen_range(0..pool.len() - 1);
        let pick = pool[ticket];
        Some(if pick == anchor { pool[pool.len() - 1] } else { pick })
    }

    /// Uniform pick over all labelled samples outside the anchor's class.
    fn different_label_context(
        &self,
        anchor: usize,
        label: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<Triple> {
        let own = self.index.members(label).map_or(0, |m| m.len());
        let others = self.index.labeled_total() - own;
        if others == 0 {
            return Err(SembError::InsufficientData(format!(
                "no labeled samples outside class {:?}",
                label
            )));
        }

        let mut ticket = rng.gen_range(0..others);
        for (class, members) in &self.index.classes {
            if class == label {
                continue;
            }
            if ticket < members.len() {
                return Ok(Triple {
                    anchor,
                    context: members[ticket],
                    relation: Relation::Dissimilar,
                });
            }
            ticket -= members.len();
        }
        unreachable!("ticket exceeded the non-class member count")
    }

    /// Uniform pick from the other unlabeled samples.
    fn unlabeled_context(&self, anchor: usize, rng: &mut ChaCha8Rng) -> Result<Triple> {
        let pool = self.index.unlabeled();
        if pool.len() < 2 {
            return Err(SembError::InsufficientData(format!(
                "unlabeled anchor {} has no unlabeled partner",
                anchor
            )));
        }
        let ticket = rng.gen_range(0..pool.len() - 1);
        let pick = pool[ticket];
        let context = if pick == anchor { pool[pool.len() - 1] } else { pick };
        Ok(Triple {
            anchor,
            context,
            relation: Relation::Dissimilar,
        })
    }
}

/// Integer weight levels in 1..=q for neighbour candidates, proportional
/// to inverse distance relative to the closest candidate. An exact-match
/// neighbour (zero distance) takes the maximum level.
fn quantized_weights(candidates: &[GraphEdge], q: u32) -> Vec<u64> {
    let min_dist = candidates
        .iter()
        .map(|e| e.distance)
        .fold(f32::INFINITY, f32::min);

    candidates
        .iter()
        .map(|e| {
            if e.distance <= 0.0 {
                q as u64
            } else {
                let level = (q as f64 * (min_dist as f64 / e.distance as f64)).round() as u64;
                level.max(1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::graph::{self, GraphConfig};

    fn labeled_set() -> SampleSet {
        // Two well-separated clusters plus a singleton class and two
        // unlabeled samples
        let mut samples = Vec::new();
        for i in 0..5 {
            samples.push(Sample::new(
                format!("A{}", i),
                vec![i as f32 * 0.1, 0.0],
                Some("alpha".to_string()),
            ));
        }
        for i in 0..5 {
            samples.push(Sample::new(
                format!("B{}", i),
                vec![10.0 + i as f32 * 0.1, 0.0],
                Some("beta".to_string()),
            ));
        }
        samples.push(Sample::new("C0", vec![5.0, 5.0], Some("gamma".to_string())));
        samples.push(Sample::new("U0", vec![5.0, -5.0], None));
        samples.push(Sample::new("U1", vec![5.5, -5.0], None));
        SampleSet::from_samples(samples).unwrap()
    }

    fn setup(config: SamplerConfig) -> (SampleSet, SimilarityGraph, LabelPairIndex, SamplerConfig) {
        let set = labeled_set();
        let graph = graph::build(&set, &GraphConfig { neighbors: 3 }).unwrap();
        let index = LabelPairIndex::build(&set);
        (set, graph, index, config)
    }

    #[test]
    fn test_label_pair_index_partitions() {
        let set = labeled_set();
        let index = LabelPairIndex::build(&set);

        assert_eq!(index.n_classes(), 3);
        assert_eq!(index.members("alpha").unwrap().len(), 5);
        assert_eq!(index.members("gamma").unwrap(), &[10]);
        assert_eq!(index.unlabeled(), &[11, 12]);
        assert_eq!(index.labeled_total(), 11);
    }

    #[test]
    fn test_identical_seed_identical_sequence() {
        let config = SamplerConfig {
            size: 300,
            max_neighbors: 3,
            ..SamplerConfig::default()
        };
        let (set, graph, index, config) = setup(config);
        let sampler = PairSampler::new(&graph, &set, &index, config).unwrap();

        let first = sampler.sample_set().unwrap();
        let second = sampler.sample_set().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_never_a_self_pair() {
        let config = SamplerConfig {
            size: 500,
            max_neighbors: 3,
            ..SamplerConfig::default()
        };
        let (set, graph, index, config) = setup(config);
        let sampler = PairSampler::new(&graph, &set, &index, config).unwrap();

        for triple in sampler.sample_set().unwrap() {
            assert_ne!(triple.anchor, triple.context);
        }
    }

    #[test]
    fn test_label_only_relations_follow_classes() {
        let config = SamplerConfig {
            size: 400,
            graph_weight: 0.0,
            label_weight: 1.0,
            max_neighbors: 3,
            ..SamplerConfig::default()
        };
        let (set, graph, index, config) = setup(config);
        let sampler = PairSampler::new(&graph, &set, &index, config).unwrap();

        for triple in sampler.sample_set().unwrap() {
            let same = match (set.label(triple.anchor), set.label(triple.context)) {
                (Some(a), Some(c)) => a == c,
                _ => false,
            };
            match triple.relation {
                Relation::Similar => assert!(same, "similar pair with differing labels"),
                Relation::Dissimilar => assert!(!same, "dissimilar pair sharing a label"),
            }
        }
    }

    #[test]
    fn test_graph_only_contexts_are_near_neighbors() {
        let config = SamplerConfig {
            size: 400,
            graph_weight: 1.0,
            label_weight: 0.0,
            max_neighbors: 3,
            ..SamplerConfig::default()
        };
        let (set, graph, index, config) = setup(config);
        let sampler = PairSampler::new(&graph, &set, &index, config).unwrap();

        for triple in sampler.sample_set().unwrap() {
            assert_eq!(triple.relation, Relation::Similar);
            let near: Vec<usize> = graph.neighbors(triple.anchor)[..3]
                .iter()
                .map(|e| e.target)
                .collect();
            assert!(near.contains(&triple.context));
        }
    }

    #[test]
    fn test_draw_bound_beyond_degree_fails() {
        let config = SamplerConfig {
            size: 10,
            graph_weight: 1.0,
            label_weight: 0.0,
            max_neighbors: 10,
            ..SamplerConfig::default()
        };
        let (set, graph, index, config) = setup(config);
        let sampler = PairSampler::new(&graph, &set, &index, config).unwrap();

        match sampler.sample_set() {
            Err(SembError::InsufficientData(_)) => {}
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_single_class_fails_fast() {
        let samples = (0..6)
            .map(|i| {
                Sample::new(
                    format!("S{}", i),
                    vec![i as f32, 0.0],
                    Some("only".to_string()),
                )
            })
            .collect();
        let set = SampleSet::from_samples(samples).unwrap();
        let graph = graph::build(&set, &GraphConfig { neighbors: 2 }).unwrap();
        let index = LabelPairIndex::build(&set);

        let result = PairSampler::new(&graph, &set, &index, SamplerConfig::default());
        assert!(matches!(result, Err(SembError::InsufficientData(_))));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let (set, graph, index, _) = setup(SamplerConfig::default());

        let bad = SamplerConfig {
            graph_weight: 1.5,
            ..SamplerConfig::default()
        };
        assert!(PairSampler::new(&graph, &set, &index, bad).is_err());

        let bad = SamplerConfig {
            graph_weight: 0.0,
            label_weight: 0.0,
            ..SamplerConfig::default()
        };
        assert!(PairSampler::new(&graph, &set, &index, bad).is_err());
    }

    #[test]
    fn test_quantized_weight_levels() {
        let edges = [
            GraphEdge {
                target: 0,
                distance: 1.0,
            },
            GraphEdge {
                target: 1,
                distance: 2.0,
            },
            GraphEdge {
                target: 2,
                distance: 4.0,
            },
        ];
        assert_eq!(quantized_weights(&edges, 100), vec![100, 50, 25]);

        let exact = [
            GraphEdge {
                target: 0,
                distance: 0.0,
            },
            GraphEdge {
                target: 1,
                distance: 3.0,
            },
        ];
        // Exact match takes the top level, the rest floor at 1
        assert_eq!(quantized_weights(&exact, 10), vec![10, 1]);
    }
}
