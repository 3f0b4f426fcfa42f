use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_ARTICLE_ID: u64 = 3487685;
pub const DEFAULT_FIGSHARE_URL: &str = "https://api.figshare.com/v2/articles/{}/versions";
pub const DEFAULT_MUTATIONS_JSON_URL: &str = "https://github.com/cognoma/machine-learning/raw/876b8131bab46878cb49ae7243e459ec0acd2b47/data/api/hippo-input.json";

/// Run configuration, read from a JSON file. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// figshare article holding the dataset.
    pub article_id: u64,
    /// Versions endpoint; `{}` is replaced by the article id.
    pub figshare_url: String,
    /// Root of the local download tree.
    pub directory: PathBuf,
    /// Dataset version, latest when absent.
    pub version: Option<u32>,
    pub expressions_file: String,
    pub mutation_file: String,
    pub covariates_file: String,
    /// Label feed used when `mutation` is not set.
    pub mutations_json_url: String,
    /// Mutation-matrix column to classify. Takes precedence over the feed.
    pub mutation: Option<String>,
    /// Numeric covariates appended to the expression features.
    pub covariate_columns: Vec<String>,
    /// Keep only the first N labelled samples.
    pub max_samples: Option<usize>,
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            article_id: DEFAULT_ARTICLE_ID,
            figshare_url: DEFAULT_FIGSHARE_URL.to_string(),
            directory: PathBuf::from("download"),
            version: None,
            expressions_file: "expression-matrix.tsv.bz2".to_string(),
            mutation_file: "mutation-matrix.tsv.bz2".to_string(),
            covariates_file: "covariates.tsv".to_string(),
            mutations_json_url: DEFAULT_MUTATIONS_JSON_URL.to_string(),
            mutation: None,
            covariate_columns: Vec::new(),
            max_samples: None,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Split and grid-search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub test_size: f64,
    pub seed: u64,
    pub cv_folds: usize,
    /// Number of features kept by MAD selection.
    pub n_features: usize,
    pub alphas: Vec<f64>,
    pub l1_ratios: Vec<f64>,
    pub max_iter: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            test_size: 0.1,
            seed: 0,
            cv_folds: 3,
            n_features: 500,
            alphas: vec![1e-3, 1e-2, 1e-1, 1.0],
            l1_ratios: vec![0.0, 0.05, 0.1, 0.2, 0.5, 0.8, 0.95, 1.0],
            max_iter: 300,
        }
    }
}

impl Config {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(c.test_size > 0.0 && c.test_size < 1.0) {
            bail!("test_size must be in (0, 1), got {}", c.test_size);
        }
        if c.cv_folds < 2 {
            bail!("cv_folds must be at least 2, got {}", c.cv_folds);
        }
        if c.alphas.is_empty() || c.l1_ratios.is_empty() {
            bail!("alphas and l1_ratios must not be empty");
        }
        if c.alphas.iter().any(|a| !(*a >= 0.0)) {
            bail!("alphas must be non-negative");
        }
        if c.l1_ratios.iter().any(|r| !(0.0..=1.0).contains(r)) {
            bail!("l1_ratios must lie in [0, 1]");
        }
        if !self.figshare_url.contains("{}") {
            bail!("figshare_url must contain a {{}} placeholder for the article id");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"version": 4, "mutation": "7157", "classifier": {"test_size": 0.2}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.version, Some(4));
        assert_eq!(config.mutation.as_deref(), Some("7157"));
        assert_eq!(config.article_id, DEFAULT_ARTICLE_ID);
        assert_eq!(config.classifier.test_size, 0.2);
        assert_eq!(config.classifier.cv_folds, 3);
    }

    #[test]
    fn rejects_bad_test_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"classifier": {"test_size": 1.5}}"#).unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn classifier_settings_must_be_nested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"test_size": 0.2, "max_iter": 50}"#).unwrap();
        assert!(Config::load(&path).is_err());

        fs::write(&path, r#"{"classifier": {"max_iter": 50, "n_features": 10}}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.classifier.max_iter, 50);
        assert_eq!(config.classifier.n_features, 10);
        assert_eq!(config.classifier.test_size, 0.1);
    }

    #[test]
    fn rejects_unknown_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"articel_id": 1}"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
