//! Train/test orchestration around an injected [`Estimator`].

use std::collections::HashSet;

use log::{info, warn};
use ndarray::{Array1, Axis};

use crate::data::filter::{filter_by_labels, FilterOutcome};
use crate::data::model::{LabelSeries, NumericTable};
use crate::error::{ClassifyError, EstimatorError};
use crate::learn::split::{train_test_split, Split};
use crate::learn::Estimator;
use crate::report::{Predictions, Report, ReportInputs};

/// A single classification run: labelled rows of `features` are split,
/// the estimator is trained on the training part, and every row of
/// `features` is scored.
pub struct CognomlClassifier<'a, E: Estimator + ?Sized> {
    features: &'a NumericTable,
    selected: FilterOutcome,
    split: Split,
    estimator: &'a mut E,
    fit_error: Option<String>,
}

impl<'a, E: Estimator + ?Sized> CognomlClassifier<'a, E> {
    pub fn new(
        features: &'a NumericTable,
        labels: &LabelSeries,
        estimator: &'a mut E,
        test_size: f64,
        seed: u64,
    ) -> Result<Self, ClassifyError> {
        let selected = filter_by_labels(features, labels);
        if selected.table.is_empty() {
            return Err(ClassifyError::NoOverlap);
        }
        let split = train_test_split(selected.labels.statuses(), test_size, seed)?;
        info!(
            "Split {} labelled samples into {} training and {} testing",
            selected.labels.len(),
            split.train.len(),
            split.test.len()
        );
        Ok(Self {
            features,
            selected,
            split,
            estimator,
            fit_error: None,
        })
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    /// Train on the training partition. Failures are logged and kept for
    /// the report; prediction decides whether the run can continue.
    pub fn fit(&mut self) {
        let x_train = self.selected.table.values.select(Axis(0), &self.split.train);
        let statuses = self.selected.labels.statuses();
        let y_train: Vec<u8> = self.split.train.iter().map(|&i| statuses[i]).collect();

        info!(
            "Fitting {} on {} samples x {} features",
            self.estimator.name(),
            x_train.nrows(),
            x_train.ncols()
        );
        match self.estimator.fit(x_train.view(), &y_train) {
            Ok(()) => self.fit_error = None,
            Err(err @ EstimatorError::Unsupported(_)) => {
                warn!("{} cannot be fitted: {err}", self.estimator.name());
                self.fit_error = Some(err.to_string());
            }
            Err(err) => {
                warn!("fitting {} failed: {err}", self.estimator.name());
                self.fit_error = Some(err.to_string());
            }
        }
    }

    /// Score every row of the full feature table.
    ///
    /// Each estimator output must hold exactly one value per row.
    pub fn predict(&self) -> Result<Predictions, ClassifyError> {
        let x = self.features.values.view();
        let rows = self.features.n_rows();
        let status = self.estimator.predict(x).map_err(ClassifyError::Predict)?;
        check_len("predict", status.len(), rows)?;
        let optional = |method: &str,
                        result: Result<Array1<f64>, EstimatorError>|
         -> Result<Option<Vec<f64>>, ClassifyError> {
            match result {
                Ok(values) => {
                    check_len(method, values.len(), rows)?;
                    Ok(Some(values.to_vec()))
                }
                Err(EstimatorError::Unsupported(_)) => Ok(None),
                Err(err) => Err(ClassifyError::Predict(err)),
            }
        };
        Ok(Predictions {
            sample_ids: self.features.index.clone(),
            status,
            score: optional("decision_function", self.estimator.decision_function(x))?,
            prob: optional("predict_proba", self.estimator.predict_proba(x))?,
        })
    }

    pub fn get_results(&self) -> Result<Report, ClassifyError> {
        let predictions = self.predict()?;
        let ids = self.selected.labels.ids();
        let testing_ids: HashSet<&str> = self.split.test.iter().map(|&i| ids[i].as_str()).collect();
        Ok(Report::build(ReportInputs {
            predictions,
            labels: &self.selected.labels,
            testing_ids,
            n_features: self.features.n_cols(),
            labels_unmatched: self.selected.unmatched.len(),
            labels_duplicated: self.selected.duplicates,
            search: self.estimator.search_trace(),
            model: self.estimator.model_info(&self.features.columns),
            fit_error: self.fit_error.clone(),
        }))
    }
}

fn check_len(method: &str, got: usize, rows: usize) -> Result<(), ClassifyError> {
    if got == rows {
        return Ok(());
    }
    Err(ClassifyError::Predict(EstimatorError::InvalidInput(format!(
        "{method} returned {got} values for {rows} samples"
    ))))
}

/// Split, fit, predict and report in one call.
pub fn classify<E: Estimator + ?Sized>(
    features: &NumericTable,
    labels: &LabelSeries,
    estimator: &mut E,
    test_size: f64,
    seed: u64,
) -> Result<Report, ClassifyError> {
    let mut classifier = CognomlClassifier::new(features, labels, estimator, test_size, seed)?;
    classifier.fit();
    classifier.get_results()
}
