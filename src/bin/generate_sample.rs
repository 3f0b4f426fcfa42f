use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use cognoml::data::synthetic::{generate, write_labels_json, write_tsv, SyntheticSpec};

/// Write a synthetic expression matrix and mutation labels for offline runs
/// with `cognoml classify --expression <tsv> --labels <json>`.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Output directory.
    #[arg(long, default_value = "sample_data")]
    out: PathBuf,
    #[arg(long, default_value_t = 100)]
    samples: usize,
    #[arg(long, default_value_t = 30)]
    positives: usize,
    /// Samples with expression data but no label.
    #[arg(long, default_value_t = 10)]
    unlabeled: usize,
    #[arg(long, default_value_t = 200)]
    features: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let spec = SyntheticSpec {
        samples: args.samples,
        positives: args.positives,
        unlabeled: args.unlabeled,
        features: args.features,
        seed: args.seed,
        ..SyntheticSpec::default()
    };
    let dataset = generate(&spec);

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let expression = args.out.join("expression-matrix.tsv");
    let labels = args.out.join("mutation-labels.json");
    write_tsv(&expression, &dataset.features)?;
    write_labels_json(&labels, &dataset.labels)?;

    println!(
        "Wrote {} samples x {} genes to {} and {} labels ({} mutated) to {}",
        dataset.features.n_rows(),
        dataset.features.n_cols(),
        expression.display(),
        dataset.labels.len(),
        dataset.labels.positives(),
        labels.display()
    );
    Ok(())
}
