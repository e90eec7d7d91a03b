use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// semb: semi-supervised expression embedding trainer
#[derive(Parser, Debug)]
#[command(name = "semb")]
#[command(about = "Semi-supervised expression embedding trainer")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the embedding model end to end
    Train(TrainArgs),

    /// Draw anchor/context pairs and write them to a table
    Sample(SampleArgs),
}

/// Training arguments
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Expression matrix (genes in rows, samples in columns)
    #[arg(short, long, required = true)]
    pub expression: PathBuf,

    /// Label table keyed by sample id
    #[arg(short, long, required = true)]
    pub labels: PathBuf,

    /// Output directory for history, encoder and model metadata
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Number of training epochs
    #[arg(short = 'c', long, default_value = "75")]
    pub epochs: usize,

    /// Batch size
    #[arg(short, long, default_value = "64")]
    pub batch_size: usize,

    /// Learning rate
    #[arg(long, default_value = "0.01")]
    pub learning_rate: f64,

    /// Dropout rate
    #[arg(long, default_value = "0.3")]
    pub dropout: f64,

    /// Nearest neighbors per sample in the similarity graph
    #[arg(short = 'k', long, default_value = "2")]
    pub neighbors: usize,

    /// Number of anchor/context pairs to draw
    #[arg(short = 'n', long, default_value = "10000")]
    pub sample_size: usize,

    /// Relative weight of graph-context draws (r1)
    #[arg(long, default_value = "0.5")]
    pub graph_weight: f64,

    /// Relative weight of label-context draws (r2)
    #[arg(long, default_value = "0.5")]
    pub label_weight: f64,

    /// Quantization levels for neighbor weighting
    #[arg(long, default_value = "100")]
    pub quantization: u32,

    /// Graph neighbors considered per draw
    #[arg(long, default_value = "10")]
    pub max_neighbors: usize,

    /// Training set portion
    #[arg(long, default_value = "0.6")]
    pub train_portion: f64,

    /// Validation set portion
    #[arg(long, default_value = "0.2")]
    pub val_portion: f64,

    /// Seed for the load-time sample shuffle
    #[arg(long, default_value = "33")]
    pub load_seed: u64,

    /// Seed for pair sampling
    #[arg(long, default_value = "123")]
    pub sampler_seed: u64,

    /// Seed for the dataset split
    #[arg(long, default_value = "33")]
    pub split_seed: u64,

    /// Seed for model parameter initialization
    #[arg(long, default_value = "42")]
    pub model_seed: u64,

    /// Validation anchors probed per epoch
    #[arg(long, default_value = "10")]
    pub probe_size: usize,

    /// Nearest samples listed per probed anchor
    #[arg(long, default_value = "10")]
    pub top_k: usize,
}

/// Sampling arguments
#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Expression matrix (genes in rows, samples in columns)
    #[arg(short, long, required = true)]
    pub expression: PathBuf,

    /// Label table keyed by sample id
    #[arg(short, long, required = true)]
    pub labels: PathBuf,

    /// Output file for sampled pairs (TSV)
    #[arg(short, long, default_value = "pairs.tsv")]
    pub output: PathBuf,

    /// Nearest neighbors per sample in the similarity graph
    #[arg(short = 'k', long, default_value = "2")]
    pub neighbors: usize,

    /// Number of anchor/context pairs to draw
    #[arg(short = 'n', long, default_value = "10000")]
    pub sample_size: usize,

    /// Relative weight of graph-context draws (r1)
    #[arg(long, default_value = "0.5")]
    pub graph_weight: f64,

    /// Relative weight of label-context draws (r2)
    #[arg(long, default_value = "0.5")]
    pub label_weight: f64,

    /// Quantization levels for neighbor weighting
    #[arg(long, default_value = "100")]
    pub quantization: u32,

    /// Graph neighbors considered per draw
    #[arg(long, default_value = "10")]
    pub max_neighbors: usize,

    /// Seed for the load-time sample shuffle
    #[arg(long, default_value = "33")]
    pub load_seed: u64,

    /// Seed for pair sampling
    #[arg(long, default_value = "123")]
    pub sampler_seed: u64,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
