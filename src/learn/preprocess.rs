use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::EstimatorError;

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Median absolute deviation of one column.
pub fn mad(column: ArrayView1<f64>) -> f64 {
    let mut values = column.to_vec();
    let center = median(&mut values);
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&mut deviations)
}

/// Keeps the `k` most variable features, ranked by median absolute
/// deviation. Selected columns keep their original order.
#[derive(Debug, Clone)]
pub struct MadSelector {
    pub k: usize,
    selected: Vec<usize>,
    n_input: usize,
}

impl MadSelector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            selected: Vec::new(),
            n_input: 0,
        }
    }

    pub fn fit(&mut self, x: ArrayView2<f64>) {
        let scores: Vec<f64> = x.axis_iter(Axis(1)).map(mad).collect();
        let mut order: Vec<usize> = (0..scores.len()).collect();
        // NaN scores rank last; ties keep column order
        order.sort_by(|&a, &b| {
            let (sa, sb) = (scores[a], scores[b]);
            match (sa.is_nan(), sb.is_nan()) {
                (false, false) => sb.total_cmp(&sa),
                (a_nan, b_nan) => a_nan.cmp(&b_nan),
            }
            .then(a.cmp(&b))
        });
        order.truncate(self.k.min(scores.len()));
        order.sort_unstable();
        self.selected = order;
        self.n_input = x.ncols();
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EstimatorError> {
        if x.ncols() != self.n_input {
            return Err(EstimatorError::FeatureMismatch {
                expected: self.n_input,
                got: x.ncols(),
            });
        }
        Ok(x.select(Axis(1), &self.selected))
    }
}

/// Centers each feature and scales it to unit variance.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), EstimatorError> {
        let n = x.nrows();
        if n == 0 {
            return Err(EstimatorError::InvalidInput("no rows to scale".into()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::InvalidInput(
                "features contain missing or infinite values".into(),
            ));
        }
        let mean = x.sum_axis(Axis(0)) / n as f64;
        let centered = &x - &mean;
        let var = (&centered * &centered).sum_axis(Axis(0)) / n as f64;
        self.scale = var.mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });
        self.mean = mean;
        Ok(())
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}
