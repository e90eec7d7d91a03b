use crate::data::{LabelEncoder, PortionConfig, SampleSet};
use crate::error::Result;
use crate::sampling::Triple;
use crate::utils::random::seeded_rng;
use rand::seq::SliceRandom;
use std::ops::Range;
use tracing::info;

/// Materialized pair attributes, one entry per triple across every array.
///
/// All arrays stay index-aligned: position p refers to the same sampled
/// pair everywhere. Splitting permutes all of them identically.
#[derive(Debug, Clone, Default)]
pub struct PairSet {
    pub triples: Vec<Triple>,
    pub anchor_ids: Vec<String>,
    pub context_ids: Vec<String>,
    pub anchor_features: Vec<Vec<f32>>,
    pub context_features: Vec<Vec<f32>>,
    pub anchor_targets: Vec<Vec<f32>>,
    pub relation_targets: Vec<f32>,
}

impl PairSet {
    /// Materialize ids, feature rows and targets for sampled triples.
    pub fn from_triples(triples: &[Triple], samples: &SampleSet, encoder: &LabelEncoder) -> Self {
        let mut set = PairSet::default();
        for triple in triples {
            let anchor = samples.get(triple.anchor);
            let context = samples.get(triple.context);
            set.triples.push(*triple);
            set.anchor_ids.push(anchor.id.clone());
            set.context_ids.push(context.id.clone());
            set.anchor_features.push(anchor.features.clone());
            set.context_features.push(context.features.clone());
            set.anchor_targets
                .push(encoder.transform(anchor.label_or_sentinel()));
            set.relation_targets.push(triple.relation.target());
        }
        set
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Gather a new set in the given index order.
    fn select(&self, order: &[usize]) -> PairSet {
        let mut out = PairSet::default();
        for &i in order {
            out.triples.push(self.triples[i]);
            out.anchor_ids.push(self.anchor_ids[i].clone());
            out.context_ids.push(self.context_ids[i].clone());
            out.anchor_features.push(self.anchor_features[i].clone());
            out.context_features.push(self.context_features[i].clone());
            out.anchor_targets.push(self.anchor_targets[i].clone());
            out.relation_targets.push(self.relation_targets[i]);
        }
        out
    }

    /// Borrowed view over a contiguous range of pairs.
    pub fn batch(&self, range: Range<usize>) -> PairBatch<'_> {
        PairBatch {
            anchor_features: &self.anchor_features[range.clone()],
            context_features: &self.context_features[range.clone()],
            anchor_targets: &self.anchor_targets[range.clone()],
            relation_targets: &self.relation_targets[range],
        }
    }

    /// Borrowed view over the whole set.
    pub fn full(&self) -> PairBatch<'_> {
        self.batch(0..self.len())
    }
}

/// Borrowed, index-aligned slices of one batch of pairs.
#[derive(Debug, Clone, Copy)]
pub struct PairBatch<'a> {
    pub anchor_features: &'a [Vec<f32>],
    pub context_features: &'a [Vec<f32>],
    pub anchor_targets: &'a [Vec<f32>],
    pub relation_targets: &'a [f32],
}

impl PairBatch<'_> {
    /// Number of pairs in the batch.
    pub fn len(&self) -> usize {
        self.anchor_features.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.anchor_features.is_empty()
    }
}

/// The three disjoint dataset partitions.
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: PairSet,
    pub val: PairSet,
    pub test: PairSet,
}

/// Split pairs into train/validation/test under a single seeded
/// permutation.
///
/// Sizes are floor(M·p_train) and floor(M·(p_train+p_val)) − floor(M·p_train)
/// with the remainder as test. The permutation is the only randomness; no
/// stratification across relation labels is attempted.
pub fn split_pairs(pairs: &PairSet, portions: &PortionConfig) -> Result<Partition> {
    portions.validate()?;

    let m = pairs.len();
    let mut order: Vec<usize> = (0..m).collect();
    let mut rng = seeded_rng(portions.seed);
    order.shuffle(&mut rng);

    let n_train = (m as f64 * portions.train) as usize;
    let n_train_val = (m as f64 * (portions.train + portions.val)) as usize;

    let partition = Partition {
        train: pairs.select(&order[..n_train]),
        val: pairs.select(&order[n_train..n_train_val]),
        test: pairs.select(&order[n_train_val..]),
    };

    info!(
        "Split {} pairs: train={}, val={}, test={}",
        m,
        partition.train.len(),
        partition.val.len(),
        partition.test.len()
    );
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::sampling::Relation;
    use std::collections::HashSet;

    fn make_pairs(m: usize) -> PairSet {
        let samples = SampleSet::from_samples(
            (0..10)
                .map(|i| {
                    Sample::new(
                        format!("S{}", i),
                        vec![i as f32, (i * i) as f32],
                        Some(if i % 2 == 0 { "even" } else { "odd" }.to_string()),
                    )
                })
                .collect(),
        )
        .unwrap();
        let encoder = LabelEncoder::fit(&samples);

        let triples: Vec<Triple> = (0..m)
            .map(|i| Triple {
                anchor: i % 10,
                context: (i + 1) % 10,
                relation: if i % 3 == 0 {
                    Relation::Similar
                } else {
                    Relation::Dissimilar
                },
            })
            .collect();
        PairSet::from_triples(&triples, &samples, &encoder)
    }

    #[test]
    fn test_split_sizes_are_exact() {
        let pairs = make_pairs(200);
        let portions = PortionConfig {
            train: 0.6,
            val: 0.2,
            seed: 33,
        };
        let partition = split_pairs(&pairs, &portions).unwrap();

        assert_eq!(partition.train.len(), 120);
        assert_eq!(partition.val.len(), 40);
        assert_eq!(partition.test.len(), 40);
        assert_eq!(
            partition.train.len() + partition.val.len() + partition.test.len(),
            200
        );
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover() {
        // Rows can repeat, so compare multisets of full row keys
        let pairs = make_pairs(90);
        let portions = PortionConfig {
            train: 0.5,
            val: 0.3,
            seed: 7,
        };
        let partition = split_pairs(&pairs, &portions).unwrap();

        let row_key = |set: &PairSet, i: usize| {
            (
                set.anchor_ids[i].clone(),
                set.context_ids[i].clone(),
                set.relation_targets[i] as i32,
            )
        };

        let mut counts = std::collections::HashMap::new();
        for set in [&partition.train, &partition.val, &partition.test] {
            for i in 0..set.len() {
                *counts.entry(row_key(set, i)).or_insert(0usize) += 1;
            }
        }
        let mut original = std::collections::HashMap::new();
        for i in 0..pairs.len() {
            *original.entry(row_key(&pairs, i)).or_insert(0usize) += 1;
        }
        assert_eq!(counts, original);
    }

    #[test]
    fn test_attribute_arrays_stay_aligned() {
        let pairs = make_pairs(60);
        let portions = PortionConfig::default();
        let partition = split_pairs(&pairs, &portions).unwrap();

        for set in [&partition.train, &partition.val, &partition.test] {
            for i in 0..set.len() {
                let triple = set.triples[i];
                assert_eq!(set.anchor_ids[i], format!("S{}", triple.anchor));
                assert_eq!(set.context_ids[i], format!("S{}", triple.context));
                assert_eq!(set.anchor_features[i][0], triple.anchor as f32);
                assert_eq!(set.context_features[i][0], triple.context as f32);
                assert_eq!(set.relation_targets[i], triple.relation.target());
            }
        }
    }

    #[test]
    fn test_same_seed_same_partition() {
        let pairs = make_pairs(50);
        let portions = PortionConfig {
            train: 0.6,
            val: 0.2,
            seed: 42,
        };
        let first = split_pairs(&pairs, &portions).unwrap();
        let second = split_pairs(&pairs, &portions).unwrap();

        assert_eq!(first.train.anchor_ids, second.train.anchor_ids);
        assert_eq!(first.val.anchor_ids, second.val.anchor_ids);
        assert_eq!(first.test.anchor_ids, second.test.anchor_ids);
        assert_eq!(first.train.triples, second.train.triples);
    }

    #[test]
    fn test_different_seed_moves_rows() {
        let pairs = make_pairs(50);
        let a = split_pairs(
            &pairs,
            &PortionConfig {
                train: 0.6,
                val: 0.2,
                seed: 1,
            },
        )
        .unwrap();
        let b = split_pairs(
            &pairs,
            &PortionConfig {
                train: 0.6,
                val: 0.2,
                seed: 2,
            },
        )
        .unwrap();
        assert_ne!(a.train.triples, b.train.triples);
    }

    #[test]
    fn test_batch_views() {
        let pairs = make_pairs(10);
        let batch = pairs.batch(2..5);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.anchor_features[0], pairs.anchor_features[2]);

        let full = pairs.full();
        assert_eq!(full.len(), 10);
    }

    #[test]
    fn test_invalid_portions_rejected() {
        let pairs = make_pairs(10);
        let bad = PortionConfig {
            train: 0.9,
            val: 0.2,
            seed: 0,
        };
        assert!(split_pairs(&pairs, &bad).is_err());
    }

    #[test]
    fn test_relation_targets_are_binary() {
        let pairs = make_pairs(30);
        let values: HashSet<i32> = pairs.relation_targets.iter().map(|v| *v as i32).collect();
        assert!(values.is_subset(&HashSet::from([0, 1])));
    }
}
