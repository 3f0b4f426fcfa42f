use ndarray::{Array1, ArrayView2, Zip};
use serde::Serialize;

use crate::error::EstimatorError;

/// Elastic-net strength and mix.
///
/// The penalty is `alpha * (l1_ratio * |w|_1 + (1 - l1_ratio) / 2 * |w|_2^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Params {
    pub alpha: f64,
    pub l1_ratio: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn soft_threshold(v: f64, t: f64) -> f64 {
    if v > t {
        v - t
    } else if v < -t {
        v + t
    } else {
        0.0
    }
}

/// Binary logistic regression with an elastic-net penalty and balanced class
/// weights, fitted by proximal gradient descent.
///
/// The intercept is not penalised. Fitting is deterministic.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub params: Params,
    pub max_iter: usize,
    pub tol: f64,
    coef: Array1<f64>,
    intercept: f64,
    n_iter: usize,
    fitted: bool,
}

impl LogisticRegression {
    pub fn new(params: Params, max_iter: usize) -> Self {
        Self {
            params,
            max_iter,
            tol: 1e-5,
            coef: Array1::zeros(0),
            intercept: 0.0,
            n_iter: 0,
            fitted: false,
        }
    }

    pub fn coef(&self) -> &Array1<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Iterations used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<(), EstimatorError> {
        let (n, p) = x.dim();
        if n != y.len() {
            return Err(EstimatorError::InvalidInput(format!(
                "{n} rows but {} labels",
                y.len()
            )));
        }
        let positives = y.iter().filter(|&&v| v == 1).count();
        if positives == 0 || positives == n {
            return Err(EstimatorError::InvalidInput(
                "training labels contain a single class".into(),
            ));
        }

        // balanced weights, normalised to sum to one
        let w_pos = 0.5 / positives as f64;
        let w_neg = 0.5 / (n - positives) as f64;
        let weights = Array1::from_iter(y.iter().map(|&v| if v == 1 { w_pos } else { w_neg }));
        let targets = Array1::from_iter(y.iter().map(|&v| f64::from(v)));

        let Params { alpha, l1_ratio } = self.params;
        let l2 = alpha * (1.0 - l1_ratio);
        let l1 = alpha * l1_ratio;
        let lipschitz = 0.25 * (largest_eigenvalue(x, &weights) + 1.0) + l2;
        let step = 1.0 / lipschitz;

        let mut coef = Array1::<f64>::zeros(p);
        let mut intercept = 0.0;
        self.n_iter = self.max_iter;
        for iter in 0..self.max_iter {
            let z = x.dot(&coef) + intercept;
            let mut residual = z.mapv(sigmoid) - &targets;
            residual *= &weights;

            let grad = x.t().dot(&residual) + l2 * &coef;
            let grad_b = residual.sum();

            let mut delta: f64 = 0.0;
            Zip::from(&mut coef).and(&grad).for_each(|c, &g| {
                let next = soft_threshold(*c - step * g, step * l1);
                delta = delta.max((next - *c).abs());
                *c = next;
            });
            let next_b = intercept - step * grad_b;
            delta = delta.max((next_b - intercept).abs());
            intercept = next_b;

            if delta < self.tol {
                self.n_iter = iter + 1;
                break;
            }
        }

        self.coef = coef;
        self.intercept = intercept;
        self.fitted = true;
        Ok(())
    }

    fn check(&self, x: ArrayView2<f64>) -> Result<(), EstimatorError> {
        if !self.fitted {
            return Err(EstimatorError::NotFitted);
        }
        if x.ncols() != self.coef.len() {
            return Err(EstimatorError::FeatureMismatch {
                expected: self.coef.len(),
                got: x.ncols(),
            });
        }
        Ok(())
    }

    /// Signed distance to the decision boundary, `x·w + b`.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        self.check(x)?;
        Ok(x.dot(&self.coef) + self.intercept)
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimatorError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<u8>, EstimatorError> {
        Ok(self
            .decision_function(x)?
            .iter()
            .map(|&z| u8::from(z > 0.0))
            .collect())
    }
}

/// Power-iteration estimate of the largest eigenvalue of `Xᵀ diag(w) X`,
/// padded by 10% since the iteration approaches it from below.
fn largest_eigenvalue(x: ArrayView2<f64>, weights: &Array1<f64>) -> f64 {
    let p = x.ncols();
    if p == 0 {
        return 0.0;
    }
    let mut v = Array1::from_elem(p, 1.0 / (p as f64).sqrt());
    let mut lambda = 0.0;
    for _ in 0..30 {
        let xv = x.dot(&v) * weights;
        let next = x.t().dot(&xv);
        let norm = next.dot(&next).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        lambda = norm;
        v = next / norm;
    }
    lambda * 1.1
}

/// Two classes split by the first feature; the second is noise.
#[cfg(test)]
pub(crate) fn separable_data() -> (ndarray::Array2<f64>, Vec<u8>) {
    let x = ndarray::array![
        [-2.0, 0.3],
        [-1.5, -0.2],
        [-1.0, 0.1],
        [-0.8, -0.4],
        [0.9, 0.2],
        [1.2, -0.1],
        [1.6, 0.4],
        [2.1, 0.0],
    ];
    (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
}
