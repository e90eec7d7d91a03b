//! # semb: semi-supervised expression embedding trainer
//!
//! semb turns a partially-labeled gene expression matrix into a stream of
//! anchor/context training pairs and drives an embedding model over them.
//! Pairs mix two evidence sources: a k-nearest-neighbour similarity graph
//! over all samples and the label assignment where one exists, so the model
//! learns from supervised and unsupervised structure at once.
//!
//! ## Features
//!
//! - Exact k-NN similarity graph with sparse storage
//! - Mixed graph/label pair sampling with deterministic seeding
//! - Seeded train/validation/test splitting with aligned attributes
//! - Per-epoch nearest-neighbour probe of embedding quality
//! - TSV/CSV ingestion with gzip support
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use semb::data::partition::{split_pairs, PairSet};
//! use semb::data::{LabelEncoder, PortionConfig, Sample, SampleSet};
//! use semb::graph::{self, GraphConfig};
//! use semb::sampling::{LabelPairIndex, PairSampler, SamplerConfig};
//!
//! let samples = SampleSet::from_samples(vec![
//!     Sample::new("S1", vec![0.0, 1.0], Some("liver".to_string())),
//!     Sample::new("S2", vec![0.1, 0.9], Some("brain".to_string())),
//!     Sample::new("S3", vec![0.2, 0.8], None),
//!     Sample::new("S4", vec![0.9, 0.1], None),
//! ]).unwrap();
//!
//! let graph = graph::build(&samples, &GraphConfig { neighbors: 2 }).unwrap();
//! let index = LabelPairIndex::build(&samples);
//! let sampler = PairSampler::new(&graph, &samples, &index, SamplerConfig {
//!     size: 100,
//!     max_neighbors: 2,
//!     ..SamplerConfig::default()
//! }).unwrap();
//! let triples = sampler.sample_set().unwrap();
//!
//! let encoder = LabelEncoder::fit(&samples);
//! let pairs = PairSet::from_triples(&triples, &samples, &encoder);
//! let partition = split_pairs(&pairs, &PortionConfig::default()).unwrap();
//! assert_eq!(partition.train.len() + partition.val.len() + partition.test.len(), 100);
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;
pub mod sampling;
pub mod training;
pub mod utils;

use burn_ndarray::NdArray;

/// Default backend type
pub type DefaultBackend = NdArray<f32>;

/// Re-export commonly used types
pub use data::{LabelEncoder, Sample, SampleSet};
pub use error::{Result, SembError};
pub use graph::SimilarityGraph;
pub use sampling::{PairSampler, Relation, Triple};
pub use training::{History, TrainingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - semi-supervised expression embedding trainer",
        NAME, VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_info() {
        let info_str = info();
        assert!(info_str.contains("semb"));
        assert!(info_str.contains(VERSION));
    }
}
