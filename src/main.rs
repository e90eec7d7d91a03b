use anyhow::{Context, Result};
use semb::cli::{parse_args, setup_logging, Commands, SampleArgs, TrainArgs};
use semb::data::partition::{split_pairs, PairSet};
use semb::data::{loader, LabelEncoder, PortionConfig, SampleSet};
use semb::graph::{self, GraphConfig, SimilarityGraph};
use semb::model::architecture::SemiModel;
use semb::model::{ModelConfig, PairModel};
use semb::sampling::{LabelPairIndex, PairSampler, SamplerConfig, Triple};
use semb::training::trainer::{classification_report, Trainer};
use semb::training::TrainingConfig;
use semb::DefaultBackend;
use std::path::Path;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", semb::info());

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Sample(args) => run_sample(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_samples(expression: &Path, labels: &Path, seed: u64) -> Result<SampleSet> {
    let table = loader::load_expression(expression)
        .with_context(|| format!("Failed to load expression data from {:?}", expression))?;
    let label_table = loader::load_labels(labels)
        .with_context(|| format!("Failed to load labels from {:?}", labels))?;
    loader::assemble(table, &label_table, seed).context("Failed to assemble sample set")
}

fn sample_pairs(
    samples: &SampleSet,
    graph: &SimilarityGraph,
    config: SamplerConfig,
) -> Result<Vec<Triple>> {
    let index = LabelPairIndex::build(samples);
    let sampler =
        PairSampler::new(graph, samples, &index, config).context("Failed to set up the sampler")?;
    sampler.sample_set().context("Pair sampling failed")
}

fn run_train(args: TrainArgs) -> Result<()> {
    info!("Starting training...");
    info!("Expression file: {:?}", args.expression);
    info!("Label file: {:?}", args.labels);
    info!("Output directory: {:?}", args.output);

    semb::utils::ensure_dir(&args.output)?;

    let samples = load_samples(&args.expression, &args.labels, args.load_seed)?;

    let graph = graph::build(&samples, &GraphConfig {
        neighbors: args.neighbors,
    })
    .context("Graph construction failed")?;

    let sampler_config = SamplerConfig {
        size: args.sample_size,
        graph_weight: args.graph_weight,
        label_weight: args.label_weight,
        quantization: args.quantization,
        max_neighbors: args.max_neighbors,
        seed: args.sampler_seed,
    };
    let triples = sample_pairs(&samples, &graph, sampler_config)?;

    let encoder = LabelEncoder::fit(&samples);
    info!("Fitted label encoder with {} classes", encoder.n_classes());

    let pairs = PairSet::from_triples(&triples, &samples, &encoder);
    let partition = split_pairs(
        &pairs,
        &PortionConfig {
            train: args.train_portion,
            val: args.val_portion,
            seed: args.split_seed,
        },
    )
    .context("Dataset split failed")?;

    let model_config = ModelConfig::new(samples.n_features(), encoder.n_classes())
        .with_dropout(args.dropout)
        .with_seed(args.model_seed);
    let mut model =
        SemiModel::<DefaultBackend>::new(model_config, args.learning_rate, Default::default());

    let training_config = TrainingConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        probe_size: args.probe_size,
        probe_top_k: args.top_k,
        ..TrainingConfig::default()
    };
    let trainer = Trainer::new(training_config)?;

    info!("Training the model...");
    let history = trainer
        .train(&mut model, &partition, &samples, &encoder)
        .context("Training failed")?;

    if !partition.test.is_empty() {
        info!("Evaluating on the test partition...");
        let predictions = model.predict(
            &partition.test.anchor_features,
            &partition.test.context_features,
            args.batch_size,
        )?;
        let report =
            classification_report(&predictions.classes, &partition.test.anchor_targets, &encoder);
        info!("\n{}", report.trim_end());
    }

    info!("Serializing artifacts...");
    history.save(args.output.join("history.json"))?;
    let encoder_json = serde_json::to_string_pretty(&encoder)?;
    std::fs::write(args.output.join("encoder.json"), encoder_json)?;
    model.persist(&args.output.join("model.json"))?;

    info!("Done. Artifacts written to {:?}", args.output);
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    info!("Sampling pairs...");
    info!("Expression file: {:?}", args.expression);
    info!("Label file: {:?}", args.labels);

    let samples = load_samples(&args.expression, &args.labels, args.load_seed)?;

    let graph = graph::build(&samples, &GraphConfig {
        neighbors: args.neighbors,
    })
    .context("Graph construction failed")?;

    let sampler_config = SamplerConfig {
        size: args.sample_size,
        graph_weight: args.graph_weight,
        label_weight: args.label_weight,
        quantization: args.quantization,
        max_neighbors: args.max_neighbors,
        seed: args.sampler_seed,
    };
    let triples = sample_pairs(&samples, &graph, sampler_config)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&args.output)
        .with_context(|| format!("Failed to open {:?} for writing", args.output))?;
    writer.write_record(["anchor", "context", "relation"])?;
    for triple in &triples {
        let relation = triple.relation.target().to_string();
        writer.write_record([
            samples.get(triple.anchor).id.as_str(),
            samples.get(triple.context).id.as_str(),
            relation.as_str(),
        ])?;
    }
    writer.flush()?;

    info!("Wrote {} pairs to {:?}", triples.len(), args.output);
    Ok(())
}
