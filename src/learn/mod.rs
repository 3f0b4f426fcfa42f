//! Estimators: feature selection, scaling, logistic regression and the
//! cross-validated grid search that ties them together.

pub mod grid_search;
pub mod logistic;
pub mod pipeline;
pub mod preprocess;
pub mod split;

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView2};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::EstimatorError;

pub use grid_search::{CandidateScore, GridSearch, ParamGrid, SearchResult};
pub use logistic::{LogisticRegression, Params};
pub use pipeline::Pipeline;

/// Something that can be trained on 0/1 labels and score samples.
///
/// Every capability has a default that reports it as unsupported, so an
/// implementation only provides what it can do.
pub trait Estimator {
    fn name(&self) -> &str;

    fn fit(&mut self, _x: ArrayView2<f64>, _y: &[u8]) -> Result<(), EstimatorError> {
        Err(EstimatorError::Unsupported("fit"))
    }

    fn predict(&self, _x: ArrayView2<f64>) -> Result<Vec<u8>, EstimatorError> {
        Err(EstimatorError::Unsupported("predict"))
    }

    /// Continuous score where larger means more likely positive.
    fn decision_function(&self, _x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        Err(EstimatorError::Unsupported("decision_function"))
    }

    /// Probability of the positive class.
    fn predict_proba(&self, _x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        Err(EstimatorError::Unsupported("predict_proba"))
    }

    /// Hyperparameter search trace, for estimators that search.
    fn search_trace(&self) -> Option<&SearchResult> {
        None
    }

    /// Description of the fitted model, with one entry per used feature.
    fn model_info(&self, _feature_names: &[String]) -> Option<ModelInfo> {
        None
    }
}

/// Fitted model description as written to the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub class: String,
    pub parameters: BTreeMap<String, JsonValue>,
    pub features: Vec<FeatureWeight>,
}

/// Coefficient of one selected feature, with the scaling applied before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub coefficient: f64,
    pub mean: f64,
    pub std: f64,
}
