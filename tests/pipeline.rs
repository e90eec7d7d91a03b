//! End-to-end pipeline checks over a small synthetic expression set.

use semb::data::partition::{split_pairs, PairSet};
use semb::data::{LabelEncoder, PortionConfig, Sample, SampleSet};
use semb::graph::{self, GraphConfig};
use semb::model::architecture::SemiModel;
use semb::model::ModelConfig;
use semb::sampling::{LabelPairIndex, PairSampler, Relation, SamplerConfig};
use semb::training::trainer::Trainer;
use semb::training::TrainingConfig;
use semb::DefaultBackend;

/// 20 four-dimensional samples in three clustered classes of sizes 8/8/4.
fn synthetic_samples() -> SampleSet {
    let mut samples = Vec::new();
    for i in 0..8 {
        samples.push(Sample::new(
            format!("A{}", i),
            vec![i as f32 * 0.1, 0.0, 0.2, 0.1],
            Some("alpha".to_string()),
        ));
    }
    for i in 0..8 {
        samples.push(Sample::new(
            format!("B{}", i),
            vec![5.0 + i as f32 * 0.1, 5.0, 0.0, 0.3],
            Some("beta".to_string()),
        ));
    }
    for i in 0..4 {
        samples.push(Sample::new(
            format!("C{}", i),
            vec![0.0, 5.0 + i as f32 * 0.1, 5.0, 0.2],
            Some("gamma".to_string()),
        ));
    }
    SampleSet::from_samples(samples).unwrap()
}

#[test]
fn label_only_sampling_splits_into_exact_portions() {
    let samples = synthetic_samples();
    let graph = graph::build(&samples, &GraphConfig { neighbors: 2 }).unwrap();
    let index = LabelPairIndex::build(&samples);

    let config = SamplerConfig {
        size: 200,
        graph_weight: 0.0,
        label_weight: 1.0,
        quantization: 100,
        max_neighbors: 2,
        seed: 123,
    };
    let sampler = PairSampler::new(&graph, &samples, &index, config).unwrap();
    let triples = sampler.sample_set().unwrap();

    assert_eq!(triples.len(), 200);
    for triple in &triples {
        assert!(triple.anchor < 20);
        assert!(triple.context < 20);
        assert_ne!(triple.anchor, triple.context);

        // With r2 = 1 the relation tracks label identity exactly
        let same = samples.label(triple.anchor) == samples.label(triple.context);
        match triple.relation {
            Relation::Similar => assert!(same),
            Relation::Dissimilar => assert!(!same),
        }
    }

    let encoder = LabelEncoder::fit(&samples);
    let pairs = PairSet::from_triples(&triples, &samples, &encoder);
    let partition = split_pairs(
        &pairs,
        &PortionConfig {
            train: 0.6,
            val: 0.2,
            seed: 33,
        },
    )
    .unwrap();

    assert_eq!(partition.train.len(), 120);
    assert_eq!(partition.val.len(), 40);
    assert_eq!(partition.test.len(), 40);
}

#[test]
fn mixed_sampling_is_reproducible() {
    let samples = synthetic_samples();
    let graph = graph::build(&samples, &GraphConfig { neighbors: 2 }).unwrap();
    let index = LabelPairIndex::build(&samples);

    let config = SamplerConfig {
        size: 300,
        graph_weight: 0.5,
        label_weight: 0.5,
        quantization: 100,
        max_neighbors: 2,
        seed: 7,
    };
    let sampler = PairSampler::new(&graph, &samples, &index, config).unwrap();

    let first = sampler.sample_set().unwrap();
    let second = sampler.sample_set().unwrap();
    assert_eq!(first, second);

    for triple in &first {
        assert_ne!(triple.anchor, triple.context);
    }
}

#[test]
fn graph_rows_have_exact_neighbor_counts() {
    let samples = synthetic_samples();
    let config = GraphConfig { neighbors: 2 };

    let first = graph::build(&samples, &config).unwrap();
    let second = graph::build(&samples, &config).unwrap();
    assert_eq!(first, second);

    for i in 0..samples.len() {
        assert_eq!(first.degree(i), 2);
    }
}

#[test]
fn training_runs_end_to_end() {
    let samples = synthetic_samples();
    let graph = graph::build(&samples, &GraphConfig { neighbors: 2 }).unwrap();
    let index = LabelPairIndex::build(&samples);

    let sampler_config = SamplerConfig {
        size: 200,
        graph_weight: 0.5,
        label_weight: 0.5,
        quantization: 100,
        max_neighbors: 2,
        seed: 123,
    };
    let sampler = PairSampler::new(&graph, &samples, &index, sampler_config).unwrap();
    let triples = sampler.sample_set().unwrap();

    let encoder = LabelEncoder::fit(&samples);
    let pairs = PairSet::from_triples(&triples, &samples, &encoder);
    let partition = split_pairs(
        &pairs,
        &PortionConfig {
            train: 0.6,
            val: 0.2,
            seed: 33,
        },
    )
    .unwrap();

    let model_config = ModelConfig {
        input_size: 4,
        n_classes: encoder.n_classes(),
        hidden_size_1: 16,
        hidden_size_2: 8,
        embedding_size: 4,
        dropout: 0.0,
        seed: 42,
    };
    let mut model = SemiModel::<DefaultBackend>::new(model_config, 0.05, Default::default());

    let training_config = TrainingConfig {
        epochs: 2,
        batch_size: 32,
        probe_size: 3,
        probe_top_k: 3,
        ..TrainingConfig::default()
    };
    let trainer = Trainer::new(training_config).unwrap();

    let history = trainer
        .train(&mut model, &partition, &samples, &encoder)
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.records().iter().all(|r| r.loss.is_finite()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    history.save(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["records"].as_array().unwrap().len(), 2);
}
