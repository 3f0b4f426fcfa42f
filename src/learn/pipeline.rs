use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2};
use serde_json::json;

use super::logistic::{LogisticRegression, Params};
use super::preprocess::{MadSelector, StandardScaler};
use super::{Estimator, FeatureWeight, ModelInfo};
use crate::error::EstimatorError;

/// MAD feature selection → standard scaling → logistic regression.
#[derive(Debug, Clone)]
pub struct Pipeline {
    selector: MadSelector,
    scaler: StandardScaler,
    model: LogisticRegression,
    fitted: bool,
}

impl Pipeline {
    pub fn new(n_features: usize, params: Params, max_iter: usize) -> Self {
        Self {
            selector: MadSelector::new(n_features),
            scaler: StandardScaler::default(),
            model: LogisticRegression::new(params, max_iter),
            fitted: false,
        }
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EstimatorError> {
        if !self.fitted {
            return Err(EstimatorError::NotFitted);
        }
        let selected = self.selector.transform(x)?;
        Ok(self.scaler.transform(selected.view()))
    }
}

impl Estimator for Pipeline {
    fn name(&self) -> &str {
        "Pipeline"
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<(), EstimatorError> {
        self.selector.fit(x);
        let selected = self.selector.transform(x)?;
        self.scaler.fit(selected.view())?;
        let scaled = self.scaler.transform(selected.view());
        self.model.fit(scaled.view(), y)?;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<u8>, EstimatorError> {
        self.model.predict(self.transform(x)?.view())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        self.model.decision_function(self.transform(x)?.view())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        self.model.predict_proba(self.transform(x)?.view())
    }

    fn model_info(&self, feature_names: &[String]) -> Option<ModelInfo> {
        if !self.fitted {
            return None;
        }
        let Params { alpha, l1_ratio } = self.model.params;
        let parameters: BTreeMap<String, serde_json::Value> = [
            ("alpha", json!(alpha)),
            ("l1_ratio", json!(l1_ratio)),
            ("penalty", json!("elasticnet")),
            ("class_weight", json!("balanced")),
            ("fit_intercept", json!(true)),
            ("intercept", json!(self.model.intercept())),
            ("max_iter", json!(self.model.max_iter)),
            ("n_iter", json!(self.model.n_iter())),
            ("tol", json!(self.model.tol)),
            ("n_selected_features", json!(self.selector.selected().len())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let features = self
            .selector
            .selected()
            .iter()
            .enumerate()
            .map(|(j, &column)| FeatureWeight {
                feature: feature_names
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| column.to_string()),
                coefficient: self.model.coef()[j],
                mean: self.scaler.mean()[j],
                std: self.scaler.scale()[j],
            })
            .collect();

        Some(ModelInfo {
            class: "LogisticRegression".to_string(),
            parameters,
            features,
        })
    }
}
