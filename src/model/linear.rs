//! Linear solvers behind the forecaster: Ridge and Bayesian Ridge.
//!
//! Both solve the centered normal equations via a small Cholesky
//! factorization. The two forecaster variants in the pipeline differ only in
//! which of these they plug into the [`Regressor`] seam.

use crate::error::{ForecastError, Result};

/// A linear regression algorithm that can be fitted on a design matrix.
pub trait Regressor: Send + Sync {
    /// Fits on row-major data: `rows[i]` is the i-th observation.
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<FittedLinear>;

    /// Human-readable label used to tag forecast output.
    fn name(&self) -> &'static str;
}

/// Fitted coefficients of a linear model.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedLinear {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl FittedLinear {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }
}

/// Ridge regression: minimizes ||y - Xβ||² + λ||β||² on centered data.
#[derive(Debug, Clone)]
pub struct Ridge {
    pub lambda: f64,
}

impl Default for Ridge {
    fn default() -> Self {
        Self { lambda: 1.0 }
    }
}

impl Regressor for Ridge {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<FittedLinear> {
        let (xc, x_means, yc, y_mean) = center(rows, targets)?;
        let p = x_means.len();

        let mut xtx = gram(&xc, p);
        for (j, row) in xtx.iter_mut().enumerate() {
            row[j] += self.lambda;
        }
        let xty = gram_vec(&xc, &yc, p);

        let coefficients = Cholesky::factor(&xtx)
            .ok_or_else(|| {
                ForecastError::ComputationError("ridge normal equations not positive definite".into())
            })?
            .solve(&xty);

        Ok(finish(coefficients, &x_means, y_mean))
    }

    fn name(&self) -> &'static str {
        "Ridge"
    }
}

/// Bayesian Ridge regression via evidence maximization.
///
/// Iteratively re-estimates the noise precision `alpha` and the weight
/// precision `lambda`, solving the regularized normal equations at each
/// step. Hyper-prior constants match the conventional defaults.
#[derive(Debug, Clone)]
pub struct BayesianRidge {
    pub max_iter: usize,
    pub tol: f64,
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub lambda_1: f64,
    pub lambda_2: f64,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
        }
    }
}

impl Regressor for BayesianRidge {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<FittedLinear> {
        let (xc, x_means, yc, y_mean) = center(rows, targets)?;
        let n = yc.len();
        let p = x_means.len();

        let xtx = gram(&xc, p);
        let xty = gram_vec(&xc, &yc, p);

        let y_var = yc.iter().map(|v| v * v).sum::<f64>() / n as f64;
        let mut alpha = if y_var > 0.0 { 1.0 / y_var } else { 1.0 };
        let mut lambda = 1.0;
        let mut coefficients = vec![0.0; p];

        for _ in 0..self.max_iter {
            // A = lambda I + alpha X'X
            let mut a = vec![vec![0.0; p]; p];
            for i in 0..p {
                for j in 0..p {
                    a[i][j] = alpha * xtx[i][j];
                }
                a[i][i] += lambda;
            }
            let chol = Cholesky::factor(&a).ok_or_else(|| {
                ForecastError::ComputationError(
                    "bayesian ridge normal equations not positive definite".into(),
                )
            })?;

            let rhs: Vec<f64> = xty.iter().map(|v| alpha * v).collect();
            let new_coef = chol.solve(&rhs);

            // Effective number of well-determined parameters:
            // gamma = p - lambda * tr(A^-1).
            let mut trace = 0.0;
            for j in 0..p {
                let mut unit = vec![0.0; p];
                unit[j] = 1.0;
                trace += chol.solve(&unit)[j];
            }
            let gamma = p as f64 - lambda * trace;

            let sse: f64 = xc
                .iter()
                .zip(&yc)
                .map(|(row, y)| {
                    let pred: f64 = row.iter().zip(&new_coef).map(|(x, b)| x * b).sum();
                    (y - pred).powi(2)
                })
                .sum();
            let coef_sq: f64 = new_coef.iter().map(|b| b * b).sum();

            lambda = (gamma + 2.0 * self.lambda_1) / (coef_sq + 2.0 * self.lambda_2);
            alpha = (n as f64 - gamma + 2.0 * self.alpha_1) / (sse + 2.0 * self.alpha_2);

            let delta: f64 = coefficients
                .iter()
                .zip(&new_coef)
                .map(|(old, new)| (old - new).abs())
                .sum();
            coefficients = new_coef;
            if delta < self.tol {
                break;
            }
        }

        Ok(finish(coefficients, &x_means, y_mean))
    }

    fn name(&self) -> &'static str {
        "Bayesian Ridge"
    }
}

fn finish(coefficients: Vec<f64>, x_means: &[f64], y_mean: f64) -> FittedLinear {
    let intercept = y_mean
        - x_means
            .iter()
            .zip(&coefficients)
            .map(|(m, b)| m * b)
            .sum::<f64>();
    FittedLinear {
        intercept,
        coefficients,
    }
}

/// Centers the design matrix and target, validating shapes.
fn center(rows: &[Vec<f64>], targets: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>, Vec<f64>, f64)> {
    let n = rows.len();
    if n == 0 {
        return Err(ForecastError::EmptyData);
    }
    if n != targets.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: n,
            got: targets.len(),
        });
    }
    if n < 2 {
        return Err(ForecastError::InsufficientData { needed: 2, got: n });
    }
    let p = rows[0].len();
    for row in rows {
        if row.len() != p {
            return Err(ForecastError::DimensionMismatch {
                expected: p,
                got: row.len(),
            });
        }
    }

    let mut x_means = vec![0.0; p];
    for row in rows {
        for (mean, x) in x_means.iter_mut().zip(row) {
            *mean += x;
        }
    }
    for mean in &mut x_means {
        *mean /= n as f64;
    }
    let y_mean = targets.iter().sum::<f64>() / n as f64;

    let xc = rows
        .iter()
        .map(|row| row.iter().zip(&x_means).map(|(x, m)| x - m).collect())
        .collect();
    let yc = targets.iter().map(|y| y - y_mean).collect();
    Ok((xc, x_means, yc, y_mean))
}

fn gram(rows: &[Vec<f64>], p: usize) -> Vec<Vec<f64>> {
    let mut xtx = vec![vec![0.0; p]; p];
    for row in rows {
        for i in 0..p {
            for j in i..p {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }
    xtx
}

fn gram_vec(rows: &[Vec<f64>], targets: &[f64], p: usize) -> Vec<f64> {
    let mut xty = vec![0.0; p];
    for (row, y) in rows.iter().zip(targets) {
        for (acc, x) in xty.iter_mut().zip(row) {
            *acc += x * y;
        }
    }
    xty
}

/// Cholesky factorization of a symmetric positive definite matrix.
struct Cholesky {
    l: Vec<Vec<f64>>,
}

impl Cholesky {
    fn factor(a: &[Vec<f64>]) -> Option<Self> {
        let n = a.len();
        let mut l = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = a[i][j];
                for k in 0..j {
                    sum -= l[i][k] * l[j][k];
                }
                if i == j {
                    if sum <= 0.0 {
                        return None;
                    }
                    l[i][j] = sum.sqrt();
                } else {
                    l[i][j] = sum / l[j][j];
                }
            }
        }
        Some(Self { l })
    }

    fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = b.len();
        // Forward substitution: L z = b
        let mut z = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= self.l[i][k] * z[k];
            }
            z[i] = sum / self.l[i][i];
        }
        // Back substitution: L' x = z
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = z[i];
            for k in (i + 1)..n {
                sum -= self.l[k][i] * x[k];
            }
            x[i] = sum / self.l[i][i];
        }
        x
    }
}
