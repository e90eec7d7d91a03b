use crate::data::{Sample, SampleSet};
use crate::error::{Result, SembError};
use crate::utils::random::seeded_rng;
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported tabular file formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") {
                    Ok(FileFormat::GzippedTsv)
                } else {
                    Err(SembError::Parse(format!(
                        "cannot determine format of gzipped file {:?}",
                        path
                    )))
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            _ => Err(SembError::Parse(format!(
                "unsupported file format for {:?}",
                path
            ))),
        }
    }

    /// Field delimiter for the format.
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Whether the format is gzip-compressed.
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Parsed expression matrix: genes in rows, samples in columns.
#[derive(Debug, Clone)]
pub struct ExpressionTable {
    /// Gene identifiers, one per matrix row
    pub gene_ids: Vec<String>,
    /// Sample identifiers, one per matrix column
    pub sample_ids: Vec<String>,
    /// Per-sample expression vectors (the matrix columns)
    pub columns: Vec<Vec<f32>>,
}

/// Load an expression matrix from a delimited file.
///
/// The first column holds gene ids; the header row holds sample ids.
pub fn load_expression<P: AsRef<Path>>(path: P) -> Result<ExpressionTable> {
    let path = path.as_ref();
    info!("Loading expression data from {:?}", path);

    let format = FileFormat::from_path(path)?;
    debug!("Detected file format: {:?}", format);

    let file = File::open(path)?;
    if format.is_gzipped() {
        parse_expression(BufReader::new(GzDecoder::new(file)), format)
    } else {
        parse_expression(BufReader::new(file), format)
    }
}

fn parse_expression<R: Read>(reader: R, format: FileFormat) -> Result<ExpressionTable> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| SembError::Parse(format!("failed to read header row: {}", e)))?;
    // First header cell is the gene-id column name
    let sample_ids: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    if sample_ids.is_empty() {
        return Err(SembError::Parse(
            "expression matrix has no sample columns".to_string(),
        ));
    }

    let mut gene_ids = Vec::new();
    let mut columns: Vec<Vec<f32>> = vec![Vec::new(); sample_ids.len()];

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record =
            result.map_err(|e| SembError::Parse(format!("failed to parse record: {}", e)))?;
        let gene_id = record
            .get(0)
            .ok_or_else(|| SembError::Parse(format!("row {} has no gene id", row_idx + 2)))?;

        if record.len() != sample_ids.len() + 1 {
            return Err(SembError::Parse(format!(
                "gene {} has {} values, expected {}",
                gene_id,
                record.len() - 1,
                sample_ids.len()
            )));
        }

        for (col, field) in record.iter().skip(1).enumerate() {
            let value = field.trim().parse::<f32>().map_err(|_| {
                SembError::Parse(format!(
                    "non-numeric value {:?} for gene {} sample {}",
                    field, gene_id, sample_ids[col]
                ))
            })?;
            columns[col].push(value);
        }
        gene_ids.push(gene_id.to_string());
    }

    if gene_ids.is_empty() {
        return Err(SembError::InsufficientData(
            "expression matrix has no gene rows".to_string(),
        ));
    }

    info!(
        "Loaded {} genes across {} samples",
        gene_ids.len(),
        sample_ids.len()
    );

    Ok(ExpressionTable {
        gene_ids,
        sample_ids,
        columns,
    })
}

/// Load a label table keyed by sample id.
///
/// The first column holds sample ids and the second the label value; an
/// empty or NA-like field is treated as unlabeled.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Option<String>>> {
    let path = path.as_ref();
    info!("Loading labels from {:?}", path);

    let format = FileFormat::from_path(path)?;
    let file = File::open(path)?;
    if format.is_gzipped() {
        parse_labels(BufReader::new(GzDecoder::new(file)), format)
    } else {
        parse_labels(BufReader::new(file), format)
    }
}

fn parse_labels<R: Read>(reader: R, format: FileFormat) -> Result<HashMap<String, Option<String>>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(true)
        .from_reader(reader);

    let mut labels = HashMap::new();
    for result in csv_reader.records() {
        let record =
            result.map_err(|e| SembError::Parse(format!("failed to parse label record: {}", e)))?;
        let sample = match record.get(0) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                warn!("Skipping label row without a sample id");
                continue;
            }
        };
        let label = record
            .get(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("na") && !s.eq_ignore_ascii_case("nan"))
            .map(|s| s.to_string());
        labels.insert(sample, label);
    }

    info!("Loaded {} label entries", labels.len());
    Ok(labels)
}

/// Assemble a sample set from an expression table and a label table.
///
/// Sample order is shuffled under the given seed and every vector is
/// standardized to zero mean and unit variance.
pub fn assemble(
    expression: ExpressionTable,
    labels: &HashMap<String, Option<String>>,
    seed: u64,
) -> Result<SampleSet> {
    let n = expression.sample_ids.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = seeded_rng(seed);
    order.shuffle(&mut rng);

    let mut samples = Vec::with_capacity(n);
    for &col in &order {
        let id = &expression.sample_ids[col];
        let label = labels
            .get(id)
            .ok_or_else(|| SembError::Parse(format!("sample {} has no label table entry", id)))?
            .clone();

        let mut features = expression.columns[col].clone();
        standardize(&mut features);
        samples.push(Sample::new(id.clone(), features, label));
    }

    let set = SampleSet::from_samples(samples)?;
    info!(
        "Assembled {} samples ({} labeled, {} unlabeled)",
        set.len(),
        set.labeled_count(),
        set.len() - set.labeled_count()
    );
    Ok(set)
}

/// In-place z-score standardization of one vector.
fn standardize(values: &mut [f32]) {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let mut std = variance.sqrt();
    if std < 1e-8 {
        std = 1.0;
    }
    for v in values.iter_mut() {
        *v = (*v - mean) / std;
    }
}
