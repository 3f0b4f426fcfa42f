use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};

use super::files::create_dir;
use super::figshare::{self, Article};
use super::filter::filter_data_by_mutation;
use super::labels::{fetch_mutation_labels, parse_mutation_labels};
use super::loader;
use super::model::{CovariateTable, LabelSeries, NumericTable};
use super::remote::Remote;
use crate::config::Config;
use crate::error::DataError;

/// Where the classification labels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// A column of the downloaded mutation matrix.
    Mutation(String),
    /// The JSON mutation-label feed at this URL.
    Feed(String),
}

impl LabelSource {
    pub fn from_config(config: &Config) -> Self {
        match &config.mutation {
            Some(column) => LabelSource::Mutation(column.clone()),
            None => LabelSource::Feed(config.mutations_json_url.clone()),
        }
    }
}

/// Which raw table a file name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Expression,
    Mutation,
    Covariates,
}

impl TableKind {
    /// File name of the parsed cache for this table.
    pub fn cache_name(self) -> &'static str {
        match self {
            TableKind::Expression => "expression.parquet",
            TableKind::Mutation => "mutation.parquet",
            TableKind::Covariates => "covariates.parquet",
        }
    }
}

/// Feature table and labels ready for classification.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Every sample with expression data, labelled or not.
    pub features: NumericTable,
    pub labels: LabelSeries,
}

impl Dataset {
    /// Truncate the labels to `max_samples` and impute missing feature cells.
    fn assemble(
        mut features: NumericTable,
        mut labels: LabelSeries,
        max_samples: Option<usize>,
    ) -> Self {
        if let Some(n) = max_samples {
            labels = labels.head(n);
        }
        let filled = features.impute_column_means();
        if filled > 0 {
            warn!("Filled {filled} missing expression values with their column mean");
        }
        info!(
            "Dataset has {} samples x {} features, {} labels ({} positive)",
            features.n_rows(),
            features.n_cols(),
            labels.len(),
            labels.positives()
        );
        Dataset { features, labels }
    }

    /// Load an expression TSV and a mutation-label JSON document from disk,
    /// such as the files written by `generate_sample`.
    pub fn from_files(
        expression: &Path,
        labels: &Path,
        max_samples: Option<usize>,
    ) -> Result<Self, DataError> {
        info!("Reading table from file {}", expression.display());
        let features = loader::read_numeric_tsv(expression)?;
        let raw = fs::read_to_string(labels).map_err(|e| DataError::io(labels, e))?;
        let doc = serde_json::from_str(&raw)
            .with_context(|| format!("parsing labels {}", labels.display()))?;
        let series = parse_mutation_labels(doc)?;
        Ok(Self::assemble(features, series, max_samples))
    }
}

/// Downloads, caches and assembles one version of the figshare dataset.
pub struct CognomlData<R> {
    remote: R,
    config: Config,
    versions: BTreeMap<u32, String>,
    version: u32,
    download_path: PathBuf,
}

impl<R: Remote> CognomlData<R> {
    /// Resolve the dataset version against the figshare article listing.
    pub fn new(remote: R, config: Config) -> Result<Self, DataError> {
        let versions =
            figshare::get_article_versions(&remote, &config.figshare_url, config.article_id)?;
        let version = figshare::resolve_version(&versions, config.version)?;
        let download_path = config.directory.join(format!("v{version}"));
        info!("Using figshare article {} version {version}", config.article_id);
        Ok(Self {
            remote,
            config,
            versions,
            version,
            download_path,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn version_url(&self) -> &str {
        // `version` was resolved from `versions`.
        self.versions.get(&self.version).map_or("", String::as_str)
    }

    pub fn download_path(&self) -> &Path {
        &self.download_path
    }

    fn required_files(&self, labels: &LabelSource) -> Vec<&str> {
        let mut required = vec![self.config.expressions_file.as_str()];
        if matches!(labels, LabelSource::Mutation(_)) {
            required.push(self.config.mutation_file.as_str());
        }
        if !self.config.covariate_columns.is_empty() {
            required.push(self.config.covariates_file.as_str());
        }
        required
    }

    /// Fetch the manifest and download every file of this version that is
    /// not already on disk.
    pub fn download_files(&self, labels: &LabelSource) -> Result<PathBuf, DataError> {
        let article: Article = figshare::fetch_article(&self.remote, self.version_url())?;
        create_dir(&self.config.directory)?;
        figshare::download_files(
            &self.remote,
            &article,
            &self.download_path,
            &self.required_files(labels),
        )?;
        Ok(self.download_path.clone())
    }

    /// Map a raw file name onto the table it holds.
    pub fn table_kind(&self, file_name: &str) -> Result<TableKind, DataError> {
        let c = &self.config;
        if file_name == c.expressions_file {
            Ok(TableKind::Expression)
        } else if file_name == c.mutation_file {
            Ok(TableKind::Mutation)
        } else if file_name == c.covariates_file {
            Ok(TableKind::Covariates)
        } else {
            Err(DataError::UnexpectedFile {
                name: file_name.to_string(),
                expected: vec![
                    c.expressions_file.clone(),
                    c.mutation_file.clone(),
                    c.covariates_file.clone(),
                ],
            })
        }
    }

    /// Paths of the raw file and its parsed cache, checking the raw file
    /// exists when there is no cache.
    fn table_paths(&self, file_name: &str) -> Result<(PathBuf, PathBuf, bool), DataError> {
        let kind = self.table_kind(file_name)?;
        let data_path = self.download_path.join(file_name);
        let cache_path = self.download_path.join(kind.cache_name());
        let cached = cache_path.exists();
        if !cached && !data_path.exists() {
            return Err(DataError::MissingRawFile(data_path));
        }
        Ok((data_path, cache_path, cached))
    }

    /// Load the expression or mutation matrix, from cache when possible.
    pub fn load_numeric(&self, file_name: &str) -> Result<NumericTable, DataError> {
        if self.table_kind(file_name)? == TableKind::Covariates {
            return Err(DataError::Parse(anyhow::anyhow!(
                "{file_name} holds covariates, not a numeric matrix"
            )));
        }
        let (data_path, cache_path, cached) = self.table_paths(file_name)?;
        if cached {
            info!("Reading table from cached file {}", cache_path.display());
            return Ok(loader::read_numeric_parquet(&cache_path)?);
        }
        info!("Reading table from file {}", data_path.display());
        let table = loader::read_numeric_tsv(&data_path)?;
        loader::write_numeric_parquet(&cache_path, &table)?;
        Ok(table)
    }

    /// Load the covariate table, from cache when possible.
    pub fn load_covariates(&self) -> Result<CovariateTable, DataError> {
        let (data_path, cache_path, cached) = self.table_paths(&self.config.covariates_file)?;
        if cached {
            info!("Reading covariates from cached file {}", cache_path.display());
            return Ok(loader::read_covariate_parquet(&cache_path)?);
        }
        info!("Reading covariates from file {}", data_path.display());
        let table = loader::read_covariate_tsv(&data_path)?;
        loader::write_covariate_parquet(&cache_path, &table)?;
        Ok(table)
    }

    /// Download, load and assemble features and labels.
    pub fn run(&self, labels: &LabelSource) -> Result<Dataset, DataError> {
        self.download_files(labels)?;
        let mut features = self.load_numeric(&self.config.expressions_file)?;

        let series = match labels {
            LabelSource::Mutation(column) => {
                let mutations = self.load_numeric(&self.config.mutation_file)?;
                filter_data_by_mutation(column, &mutations)?
            }
            LabelSource::Feed(url) => fetch_mutation_labels(&self.remote, url)?,
        };

        if !self.config.covariate_columns.is_empty() {
            let covariates = self.load_covariates()?;
            let extra = covariates.numeric_columns(&self.config.covariate_columns, &features.index)?;
            features = features.hstack(&extra)?;
            info!("Appended {} covariate features", extra.n_cols());
        }
        Ok(Dataset::assemble(features, series, self.config.max_samples))
    }
}
