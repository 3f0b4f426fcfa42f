//! The JSON document produced by a classifier run.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::data::model::LabelSeries;
use crate::learn::{CandidateScore, ModelInfo, SearchResult};
use crate::metrics::{class_metrics, threshold_metrics, ClassMetrics, ThresholdMetrics};

/// Sentinel for a status or partition that is unknown for a sample.
pub const UNKNOWN: i64 = -1;

/// Estimator output for every row of the feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub sample_ids: Vec<String>,
    pub status: Vec<u8>,
    pub score: Option<Vec<f64>>,
    pub prob: Option<Vec<f64>>,
}

/// One row of the observations table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub sample_id: String,
    pub status: i64,
    pub testing: i64,
    pub selected: i64,
    pub predicted_status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_prob: Option<f64>,
}

impl Observation {
    /// Value ranked by the threshold metrics.
    fn ranking_score(&self) -> f64 {
        self.predicted_score
            .or(self.predicted_prob)
            .unwrap_or_else(|| f64::from(self.predicted_status))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimensions {
    pub observations_selected: usize,
    pub observations_unselected: usize,
    pub features: usize,
    pub positives: usize,
    pub negatives: usize,
    pub positive_prevalence: Option<f64>,
    pub training_observations: usize,
    pub testing_observations: usize,
    /// Labelled samples dropped because the feature table lacks them.
    pub labels_unmatched: usize,
    /// Repeated sample ids in the labels; the first status was kept.
    pub labels_duplicated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitPerformance {
    #[serde(flatten)]
    pub class: ClassMetrics,
    #[serde(flatten)]
    pub threshold: ThresholdMetrics,
}

impl SplitPerformance {
    fn from_observations<'a>(rows: impl Iterator<Item = &'a Observation>) -> Self {
        let mut y_true = Vec::new();
        let mut y_pred = Vec::new();
        let mut y_score = Vec::new();
        for row in rows {
            // partitions only contain labelled samples, so status is 0 or 1
            y_true.push(u8::from(row.status == 1));
            y_pred.push(row.predicted_status);
            y_score.push(row.ranking_score());
        }
        Self {
            class: class_metrics(&y_true, &y_pred),
            threshold: threshold_metrics(&y_true, &y_score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvPerformance {
    pub auroc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub training: SplitPerformance,
    pub testing: SplitPerformance,
    pub cv: CvPerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchReport {
    pub cv_scores: Vec<CandidateScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub dimensions: Dimensions,
    pub performance: Performance,
    pub grid_search: GridSearchReport,
    pub model: Option<ModelInfo>,
    pub observations: Vec<Observation>,
    /// Why training failed, when the estimator could not be fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_error: Option<String>,
}

/// Everything a report is assembled from.
pub struct ReportInputs<'a> {
    pub predictions: Predictions,
    /// Labels of the samples that were used, aligned with the training data.
    pub labels: &'a LabelSeries,
    pub testing_ids: HashSet<&'a str>,
    pub n_features: usize,
    pub labels_unmatched: usize,
    pub labels_duplicated: usize,
    pub search: Option<&'a SearchResult>,
    pub model: Option<ModelInfo>,
    pub fit_error: Option<String>,
}

impl Report {
    /// Right-join the labels onto the predictions and summarise.
    ///
    /// Every predicted sample yields one observation, sorted by sample id.
    /// Samples outside the label set have `status` and `testing` set to
    /// [`UNKNOWN`] and `selected` set to 0.
    pub fn build(inputs: ReportInputs<'_>) -> Self {
        let ReportInputs {
            predictions,
            labels,
            testing_ids,
            n_features,
            labels_unmatched,
            labels_duplicated,
            search,
            model,
            fit_error,
        } = inputs;

        let status_of: HashMap<&str, u8> = labels.iter().collect();
        let mut observations: Vec<Observation> = predictions
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let status = status_of.get(id.as_str()).copied();
                Observation {
                    sample_id: id.clone(),
                    status: status.map_or(UNKNOWN, i64::from),
                    testing: match status {
                        Some(_) => i64::from(testing_ids.contains(id.as_str())),
                        None => UNKNOWN,
                    },
                    selected: i64::from(status.is_some()),
                    predicted_status: predictions.status[i],
                    predicted_score: predictions.score.as_ref().map(|s| s[i]),
                    predicted_prob: predictions.prob.as_ref().map(|p| p[i]),
                }
            })
            .collect();
        observations.sort_by(|a, b| a.sample_id.cmp(&b.sample_id));

        let training = observations.iter().filter(|o| o.testing == 0);
        let testing = observations.iter().filter(|o| o.testing == 1);
        let dimensions = Dimensions {
            observations_selected: observations.iter().filter(|o| o.selected == 1).count(),
            observations_unselected: observations.iter().filter(|o| o.selected == 0).count(),
            features: n_features,
            positives: observations.iter().filter(|o| o.status == 1).count(),
            negatives: observations.iter().filter(|o| o.status == 0).count(),
            positive_prevalence: labels.prevalence(),
            training_observations: training.clone().count(),
            testing_observations: testing.clone().count(),
            labels_unmatched,
            labels_duplicated,
        };

        let performance = Performance {
            training: SplitPerformance::from_observations(training),
            testing: SplitPerformance::from_observations(testing),
            cv: CvPerformance {
                auroc: search.and_then(|s| s.best_score),
            },
        };

        Report {
            dimensions,
            performance,
            grid_search: GridSearchReport {
                cv_scores: search.map(|s| s.candidates.clone()).unwrap_or_default(),
            },
            model,
            observations,
            fit_error,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn report(score: Option<Vec<f64>>) -> Report {
        let labels = LabelSeries::from_pairs([("b", 1), ("a", 0), ("d", 0), ("e", 1)]);
        let predictions = Predictions {
            sample_ids: ["e", "d", "c", "b", "a"].map(String::from).to_vec(),
            status: vec![1, 0, 1, 0, 0],
            prob: score
                .as_ref()
                .map(|s| s.iter().map(|v| 1.0 / (1.0 + (-v).exp())).collect()),
            score,
        };
        Report::build(ReportInputs {
            predictions,
            labels: &labels,
            testing_ids: ["a", "b"].into_iter().collect(),
            n_features: 7,
            labels_unmatched: 2,
            labels_duplicated: 1,
            search: None,
            model: None,
            fit_error: None,
        })
    }

    #[test]
    fn observations_are_a_sorted_right_join() {
        let report = report(None);
        let ids: Vec<&str> = report.observations.iter().map(|o| o.sample_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);

        let c = &report.observations[2];
        assert_eq!((c.status, c.testing, c.selected), (UNKNOWN, UNKNOWN, 0));
        let b = &report.observations[1];
        assert_eq!((b.status, b.testing, b.selected), (1, 1, 1));
        assert_eq!(report.observations[4].testing, 0);
    }

    #[test]
    fn dimensions_count_the_join() {
        let d = report(None).dimensions;
        assert_eq!(d.observations_selected, 4);
        assert_eq!(d.observations_unselected, 1);
        assert_eq!(d.features, 7);
        assert_eq!((d.positives, d.negatives), (2, 2));
        assert_eq!(d.positive_prevalence, Some(0.5));
        assert_eq!((d.training_observations, d.testing_observations), (2, 2));
        assert_eq!(d.labels_unmatched, 2);
        assert_eq!(d.labels_duplicated, 1);
    }

    #[test]
    fn threshold_metrics_prefer_scores() {
        // training rows: d (0, score 0.2), e (1, score 3.0)
        let report = report(Some(vec![3.0, 0.2, 1.0, -1.0, 0.5]));
        assert_eq!(report.performance.training.threshold.auroc, Some(1.0));
        // testing rows: a (0, score 0.5), b (1, score -1.0)
        assert_eq!(report.performance.testing.threshold.auroc, Some(0.0));
        assert_eq!(report.performance.testing.class.accuracy, Some(0.5));
    }

    #[test]
    fn serialises_to_the_documented_shape() {
        let json: Value = serde_json::from_str(&report(None).to_json_pretty().unwrap()).unwrap();
        for key in ["dimensions", "performance", "grid_search", "model", "observations"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("fit_error").is_none());
        assert!(json["performance"]["cv"]["auroc"].is_null());
        assert!(json["performance"]["testing"]["auroc"].is_number());
        assert_eq!(json["grid_search"]["cv_scores"], Value::Array(vec![]));
        assert!(json["observations"][0].get("predicted_score").is_none());
    }
}
