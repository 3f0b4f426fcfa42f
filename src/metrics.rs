//! Binary classification metrics.
//!
//! Undefined values (a ratio with a zero denominator, a ranking metric on a
//! single class) are `None` and serialise as JSON `null`.

use serde::Serialize;

/// Confusion counts and the ratios derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub n_observations: usize,
    pub n_positives: usize,
    pub n_negatives: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Count-based metrics of hard predictions against 0/1 labels.
pub fn class_metrics(y_true: &[u8], y_pred: &[u8]) -> ClassMetrics {
    let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == 1, p == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };
    ClassMetrics {
        n_observations: tp + fp + tn + fn_,
        n_positives: tp + fn_,
        n_negatives: tn + fp,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
        accuracy: ratio(tp + tn, tp + fp + tn + fn_),
        precision,
        recall,
        f1,
    }
}

/// ROC points at each distinct score threshold, highest threshold first.
///
/// The first point is `(0, 0)` with an infinite threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub threshold: Vec<f64>,
}

/// Precision/recall points at each distinct score threshold, highest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub threshold: Vec<f64>,
}

/// Metrics from sweeping a threshold over continuous scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    pub auroc: Option<f64>,
    pub auprc: Option<f64>,
    pub roc_curve: RocCurve,
    pub pr_curve: PrCurve,
}

/// Cumulative (false positives, true positives, threshold) at each distinct
/// score, scanning from the highest score down.
fn cumulative_counts(y_true: &[u8], scores: &[f64]) -> Vec<(usize, usize, f64)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = Vec::new();
    let (mut fp, mut tp) = (0, 0);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_tie {
            points.push((fp, tp, scores[i]));
        }
    }
    points
}

pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> RocCurve {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        threshold: vec![f64::INFINITY],
    };
    for (fp, tp, threshold) in cumulative_counts(y_true, scores) {
        curve.fpr.push(ratio(fp, negatives).unwrap_or(f64::NAN));
        curve.tpr.push(ratio(tp, positives).unwrap_or(f64::NAN));
        curve.threshold.push(threshold);
    }
    curve
}

pub fn precision_recall_curve(y_true: &[u8], scores: &[f64]) -> PrCurve {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let mut curve = PrCurve::default();
    for (fp, tp, threshold) in cumulative_counts(y_true, scores) {
        curve.precision.push(tp as f64 / (tp + fp) as f64);
        curve.recall.push(ratio(tp, positives).unwrap_or(f64::NAN));
        curve.threshold.push(threshold);
    }
    curve
}

/// Area under the ROC curve, computed from average ranks so tied scores
/// count one half.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n = scores.len();
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 || scores.iter().any(|s| s.is_nan()) {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks start..end (1-based: start+1 ..= end) share their mean
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        rank_sum += mean_rank * tied_positives as f64;
        start = end;
    }
    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Average precision: precision at each threshold weighted by the recall
/// gained there.
pub fn average_precision(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    if positives == 0 || scores.iter().any(|s| s.is_nan()) {
        return None;
    }
    let mut ap = 0.0;
    let mut prev_tp = 0;
    for (fp, tp, _) in cumulative_counts(y_true, scores) {
        let precision = tp as f64 / (tp + fp) as f64;
        ap += (tp - prev_tp) as f64 / positives as f64 * precision;
        prev_tp = tp;
    }
    Some(ap)
}

pub fn threshold_metrics(y_true: &[u8], scores: &[f64]) -> ThresholdMetrics {
    ThresholdMetrics {
        auroc: roc_auc(y_true, scores),
        auprc: average_precision(y_true, scores),
        roc_curve: roc_curve(y_true, scores),
        pr_curve: precision_recall_curve(y_true, scores),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn confusion_counts_and_ratios() {
        let m = class_metrics(&[1, 1, 0, 0, 1], &[1, 0, 0, 1, 1]);
        assert_eq!((m.true_positives, m.false_positives), (2, 1));
        assert_eq!((m.true_negatives, m.false_negatives), (1, 1));
        assert_eq!(m.n_positives, 3);
        assert!(close(m.accuracy.unwrap(), 0.6));
        assert!(close(m.precision.unwrap(), 2.0 / 3.0));
        assert!(close(m.recall.unwrap(), 2.0 / 3.0));
        assert!(close(m.f1.unwrap(), 2.0 / 3.0));
    }

    #[test]
    fn undefined_ratios_are_none() {
        let m = class_metrics(&[0, 0], &[0, 0]);
        assert_eq!(m.precision, None);
        assert_eq!(m.recall, None);
        assert_eq!(m.f1, None);
        assert_eq!(m.accuracy, Some(1.0));

        let empty = class_metrics(&[], &[]);
        assert_eq!(empty.accuracy, None);
    }

    #[test]
    fn auroc_matches_pairwise_definition() {
        let y = [0, 0, 1, 1];
        let s = [0.1, 0.4, 0.35, 0.8];
        assert!(close(roc_auc(&y, &s).unwrap(), 0.75));
        assert!(close(roc_auc(&y, &[0.0, 0.1, 0.9, 1.0]).unwrap(), 1.0));
        // all tied: half credit
        assert!(close(roc_auc(&y, &[0.5; 4]).unwrap(), 0.5));
        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.3]), None);
    }

    #[test]
    fn roc_curve_ends_at_one_one() {
        let curve = roc_curve(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]);
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.threshold[0].is_infinite());
        assert_eq!(curve.threshold[1..], [0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn average_precision_of_known_ranking() {
        // ranking: 1 (P=1), 0, 1 (P=2/3), 0
        let ap = average_precision(&[1, 0, 1, 0], &[0.9, 0.8, 0.7, 0.1]).unwrap();
        assert!(close(ap, 0.5 * 1.0 + 0.5 * 2.0 / 3.0));

        let pr = precision_recall_curve(&[1, 0, 1, 0], &[0.9, 0.8, 0.7, 0.1]);
        assert_eq!(pr.recall, vec![0.5, 0.5, 1.0, 1.0]);
        assert_eq!(pr.precision[3], 0.5);
    }

    #[test]
    fn non_finite_values_serialize_as_null() {
        let curve = roc_curve(&[0, 1], &[0.2, 0.7]);
        let json = serde_json::to_value(&curve).unwrap();
        assert!(json["threshold"][0].is_null());
    }
}
