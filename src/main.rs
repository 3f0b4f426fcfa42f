use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use cognoml::data::dataset::{CognomlData, Dataset, LabelSource};
use cognoml::data::remote::HttpRemote;
use cognoml::learn::GridSearch;
use cognoml::{classify, logging, Config};

#[derive(Parser, Debug)]
#[command(
    name = "cognoml",
    version,
    about = "Classify mutation status from tumour expression profiles"
)]
struct Cli {
    /// JSON configuration file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append log records to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the dataset files of the configured figshare version.
    Download {
        /// Also fetch the mutation matrix, labelling by this gene column.
        #[arg(long)]
        mutation: Option<String>,
    },
    /// Train and evaluate a classifier, printing the JSON report.
    Classify {
        /// Label samples by this mutation-matrix column instead of the
        /// mutation feed.
        #[arg(long)]
        mutation: Option<String>,

        /// Keep only the first N labelled samples.
        #[arg(long, value_name = "N")]
        max_samples: Option<usize>,

        /// Read expression data from this TSV instead of figshare.
        #[arg(long, value_name = "TSV", requires = "labels", conflicts_with = "mutation")]
        expression: Option<PathBuf>,

        /// Mutation-label JSON to pair with `--expression`.
        #[arg(long, value_name = "JSON", requires = "expression")]
        labels: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Download { mutation } => {
            if mutation.is_some() {
                config.mutation = mutation;
            }
            let labels = LabelSource::from_config(&config);
            let data = CognomlData::new(HttpRemote::new()?, config)?;
            let path = data.download_files(&labels)?;
            info!("Dataset version {} is in {}", data.version(), path.display());
            println!("{}", path.display());
        }
        Commands::Classify {
            mutation,
            max_samples,
            expression,
            labels,
        } => {
            if mutation.is_some() {
                config.mutation = mutation;
            }
            if max_samples.is_some() {
                config.max_samples = max_samples;
            }
            let settings = config.classifier.clone();
            let dataset = match (expression, labels) {
                (Some(expression), Some(labels)) => {
                    Dataset::from_files(&expression, &labels, config.max_samples)?
                }
                _ => {
                    let labels = LabelSource::from_config(&config);
                    let data = CognomlData::new(HttpRemote::new()?, config)?;
                    data.run(&labels)?
                }
            };

            let mut search = GridSearch::from_config(&settings);
            let report = classify(
                &dataset.features,
                &dataset.labels,
                &mut search,
                settings.test_size,
                settings.seed,
            )?;
            let json = report.to_json_pretty().context("serialising report")?;
            println!("{json}");
        }
    }
    Ok(())
}
