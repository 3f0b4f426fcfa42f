use std::path::PathBuf;

use thiserror::Error;

/// Failures of the acquisition and table layers.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("request to {url} failed: {message}")]
    Remote { url: String, message: String },

    #[error("figshare article has no version {0}")]
    UnknownVersion(u32),

    #[error("figshare article lists no versions")]
    NoVersions,

    #[error("file {0} is not listed in the figshare manifest")]
    MissingRemoteFile(String),

    #[error("manifest file name {0:?} is not a plain file name")]
    UnsafeFileName(String),

    #[error("{} does not exist, try running download_files() first", .0.display())]
    MissingRawFile(PathBuf),

    #[error("{name} not expected input, choose one of {expected:?}")]
    UnexpectedFile { name: String, expected: Vec<String> },

    #[error("mutation {0} is not a column of the mutation matrix")]
    UnknownMutation(String),

    #[error("label for sample {sample_id} must be 0 or 1, got {value}")]
    InvalidLabel { sample_id: String, value: f64 },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] anyhow::Error),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures raised by an [`Estimator`](crate::learn::Estimator).
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// The estimator does not provide this capability at all.
    #[error("estimator does not support {0}")]
    Unsupported(&'static str),

    #[error("estimator has not been fitted")]
    NotFitted,

    #[error("expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("invalid training data: {0}")]
    InvalidInput(String),
}

/// Failures of a full classifier run.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no labelled samples overlap the feature table")]
    NoOverlap,

    #[error("cannot stratify: {0}")]
    Split(String),

    #[error("prediction failed: {0}")]
    Predict(#[source] EstimatorError),
}
