//! Exhaustive cross-validated search over the elastic-net grid.

use std::time::Instant;

use log::{debug, info, warn};
use ndarray::{Array1, ArrayView2, Axis};
use serde::Serialize;

use super::logistic::Params;
use super::pipeline::Pipeline;
use super::split::{stratified_k_fold, Split};
use super::{Estimator, ModelInfo};
use crate::config::ClassifierConfig;
use crate::error::EstimatorError;
use crate::metrics::roc_auc;

/// Values tried for each hyperparameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub alphas: Vec<f64>,
    pub l1_ratios: Vec<f64>,
}

impl ParamGrid {
    /// Every combination, alpha-major.
    pub fn candidates(&self) -> Vec<Params> {
        self.alphas
            .iter()
            .flat_map(|&alpha| {
                self.l1_ratios
                    .iter()
                    .map(move |&l1_ratio| Params { alpha, l1_ratio })
            })
            .collect()
    }
}

/// Cross-validation outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    #[serde(flatten)]
    pub params: Params,
    /// Test AUROC per fold, `None` where the fold failed to fit or score.
    pub split_test_scores: Vec<Option<f64>>,
    pub mean_test_score: Option<f64>,
    pub std_test_score: Option<f64>,
    pub mean_train_score: Option<f64>,
    /// Seconds.
    pub mean_fit_time: f64,
    pub rank_test_score: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub best_index: usize,
    pub best_params: Params,
    pub best_score: Option<f64>,
    pub candidates: Vec<CandidateScore>,
}

/// Mean and population standard deviation, `None` if any value is missing.
fn mean_std(values: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let present: Option<Vec<f64>> = values.iter().copied().collect();
    match present {
        Some(v) if !v.is_empty() => {
            let n = v.len() as f64;
            let mean = v.iter().sum::<f64>() / n;
            let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            (Some(mean), Some(var.sqrt()))
        }
        _ => (None, None),
    }
}

/// Competition ranking by mean test score; missing scores rank last.
fn rank(scores: &[Option<f64>]) -> Vec<usize> {
    let scored = scores.iter().filter(|s| s.is_some()).count();
    scores
        .iter()
        .map(|s| match s {
            Some(v) => 1 + scores.iter().flatten().filter(|&&o| o > *v).count(),
            None => scored + 1,
        })
        .collect()
}

fn auroc(y: &[u8], scores: &Array1<f64>) -> Option<f64> {
    roc_auc(y, &scores.to_vec())
}

/// Grid search over [`Pipeline`] hyperparameters, scored by AUROC.
///
/// After the search the best candidate is refitted on all the data it was
/// given and serves predictions.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub grid: ParamGrid,
    pub cv: usize,
    pub n_features: usize,
    pub max_iter: usize,
    best: Option<Pipeline>,
    result: Option<SearchResult>,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, cv: usize, n_features: usize, max_iter: usize) -> Self {
        Self {
            grid,
            cv,
            n_features,
            max_iter,
            best: None,
            result: None,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            ParamGrid {
                alphas: config.alphas.clone(),
                l1_ratios: config.l1_ratios.clone(),
            },
            config.cv_folds,
            config.n_features,
            config.max_iter,
        )
    }

    fn pipeline(&self, params: Params) -> Pipeline {
        Pipeline::new(self.n_features, params, self.max_iter)
    }

    fn fitted(&self) -> Result<&Pipeline, EstimatorError> {
        self.best.as_ref().ok_or(EstimatorError::NotFitted)
    }

    fn evaluate(
        &self,
        params: Params,
        x: ArrayView2<f64>,
        y: &[u8],
        folds: &[Split],
    ) -> CandidateScore {
        let mut test_scores = Vec::with_capacity(folds.len());
        let mut train_scores = Vec::with_capacity(folds.len());
        let mut fit_time = 0.0;

        for (i, fold) in folds.iter().enumerate() {
            let x_train = x.select(Axis(0), &fold.train);
            let y_train: Vec<u8> = fold.train.iter().map(|&r| y[r]).collect();
            let x_test = x.select(Axis(0), &fold.test);
            let y_test: Vec<u8> = fold.test.iter().map(|&r| y[r]).collect();

            let mut model = self.pipeline(params);
            let started = Instant::now();
            let fitted = model.fit(x_train.view(), &y_train);
            fit_time += started.elapsed().as_secs_f64();
            if let Err(err) = fitted {
                debug!("fold {i} failed for {params:?}: {err}");
                test_scores.push(None);
                train_scores.push(None);
                continue;
            }

            let score = |xs: ArrayView2<f64>, ys: &[u8]| {
                model
                    .decision_function(xs)
                    .ok()
                    .and_then(|s| auroc(ys, &s))
            };
            test_scores.push(score(x_test.view(), &y_test));
            train_scores.push(score(x_train.view(), &y_train));
        }

        let (mean_test_score, std_test_score) = mean_std(&test_scores);
        let (mean_train_score, _) = mean_std(&train_scores);
        CandidateScore {
            params,
            split_test_scores: test_scores,
            mean_test_score,
            std_test_score,
            mean_train_score,
            mean_fit_time: fit_time / folds.len().max(1) as f64,
            rank_test_score: 0,
        }
    }
}

impl Estimator for GridSearch {
    fn name(&self) -> &str {
        "GridSearch"
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<(), EstimatorError> {
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(EstimatorError::InvalidInput(
                "hyperparameter grid is empty".into(),
            ));
        }
        let folds = stratified_k_fold(y, self.cv)
            .map_err(|e| EstimatorError::InvalidInput(e.to_string()))?;
        info!(
            "grid search: {} candidates x {} folds on {} samples",
            candidates.len(),
            folds.len(),
            x.nrows()
        );

        let mut scores: Vec<CandidateScore> = candidates
            .into_iter()
            .map(|params| self.evaluate(params, x, y, &folds))
            .collect();
        let means: Vec<Option<f64>> = scores.iter().map(|c| c.mean_test_score).collect();
        for (candidate, r) in scores.iter_mut().zip(rank(&means)) {
            candidate.rank_test_score = r;
        }

        let best_index = scores
            .iter()
            .position(|c| c.rank_test_score == 1 && c.mean_test_score.is_some())
            .ok_or_else(|| {
                EstimatorError::InvalidInput("no candidate could be scored".into())
            })?;
        let best_params = scores[best_index].params;
        let best_score = scores[best_index].mean_test_score;
        info!("best parameters {best_params:?} with cv auroc {best_score:?}");

        let mut best = self.pipeline(best_params);
        best.fit(x, y)?;
        if scores.iter().any(|c| c.mean_test_score.is_none()) {
            warn!("some grid points could not be scored on every fold");
        }

        self.best = Some(best);
        self.result = Some(SearchResult {
            best_index,
            best_params,
            best_score,
            candidates: scores,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<u8>, EstimatorError> {
        self.fitted()?.predict(x)
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        self.fitted()?.decision_function(x)
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        self.fitted()?.predict_proba(x)
    }

    fn search_trace(&self) -> Option<&SearchResult> {
        self.result.as_ref()
    }

    fn model_info(&self, feature_names: &[String]) -> Option<ModelInfo> {
        self.best.as_ref()?.model_info(feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::logistic::separable_data;

    #[test]
    fn ranks_ties_and_missing() {
        assert_eq!(
            rank(&[Some(0.7), Some(0.9), None, Some(0.9)]),
            vec![3, 1, 4, 1]
        );
    }

    #[test]
    fn mean_std_requires_every_fold() {
        assert_eq!(mean_std(&[Some(1.0), Some(3.0)]), (Some(2.0), Some(1.0)));
        assert_eq!(mean_std(&[Some(1.0), None]), (None, None));
    }

    #[test]
    fn grid_is_alpha_major() {
        let grid = ParamGrid {
            alphas: vec![0.1, 1.0],
            l1_ratios: vec![0.0, 0.5],
        };
        let alphas: Vec<f64> = grid.candidates().iter().map(|p| p.alpha).collect();
        assert_eq!(alphas, [0.1, 0.1, 1.0, 1.0]);
    }

    #[test]
    fn searches_and_refits_best() {
        let (x, y) = separable_data();
        let mut search = GridSearch::new(
            ParamGrid {
                alphas: vec![0.001, 100.0],
                l1_ratios: vec![1.0],
            },
            2,
            10,
            300,
        );
        assert!(search.search_trace().is_none());
        search.fit(x.view(), &y).unwrap();

        let trace = search.search_trace().unwrap();
        assert_eq!(trace.candidates.len(), 2);
        assert!(trace.candidates.iter().all(|c| c.split_test_scores.len() == 2));
        assert_eq!(trace.best_params.alpha, 0.001);
        assert!(trace.best_score.unwrap() > 0.5);
        // everything shrinks to zero, so every sample ties
        assert_eq!(trace.candidates[1].mean_test_score, Some(0.5));
        assert_eq!(search.predict(x.view()).unwrap(), y);
        assert!(search.model_info(&[]).is_some());
    }

    #[test]
    fn unfitted_search_cannot_predict() {
        let (x, _) = separable_data();
        let search = GridSearch::from_config(&ClassifierConfig::default());
        assert!(matches!(
            search.decision_function(x.view()),
            Err(EstimatorError::NotFitted)
        ));
    }
}
