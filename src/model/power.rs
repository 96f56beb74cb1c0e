//! Yeo-Johnson power transform with z-score standardization.
//!
//! Mirrors the preprocessing applied to both target and exogenous inputs
//! before regression: a maximum-likelihood power transform (defined for any
//! real input, unlike Box-Cox) followed by standardization to zero mean and
//! unit variance. The lambda search is a coarse grid over [-2, 2] refined
//! around the best candidate.

/// Fitted power transform parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerTransform {
    lambda: f64,
    mean: f64,
    std: f64,
}

impl PowerTransform {
    /// Estimates lambda by maximum likelihood and the standardization
    /// moments on the transformed data.
    pub fn fit(values: &[f64]) -> Self {
        let lambda = select_lambda(values);
        let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();

        let n = transformed.len().max(1) as f64;
        let mean = transformed.iter().sum::<f64>() / n;
        let variance = if transformed.len() > 1 {
            transformed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let std = variance.sqrt();

        Self {
            lambda,
            mean,
            std: if std < 1e-10 { 1.0 } else { std },
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Applies the fitted transform to new data.
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .map(|&x| (yeo_johnson(x, self.lambda) - self.mean) / self.std)
            .collect()
    }

    pub fn transform_one(&self, value: f64) -> f64 {
        (yeo_johnson(value, self.lambda) - self.mean) / self.std
    }

    /// Maps transformed data back to the original scale.
    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&y| self.inverse_one(y)).collect()
    }

    pub fn inverse_one(&self, value: f64) -> f64 {
        inv_yeo_johnson(value * self.std + self.mean, self.lambda)
    }
}

/// The Yeo-Johnson transform for a single value.
///
/// For x >= 0: ((x+1)^λ - 1) / λ, or ln(x+1) when λ = 0.
/// For x < 0: -((1-x)^(2-λ) - 1) / (2-λ), or -ln(1-x) when λ = 2.
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < 1e-10 {
            (x + 1.0).ln()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < 1e-10 {
        -(1.0 - x).ln()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Inverse of [`yeo_johnson`]. The transform preserves sign, so the branch
/// is chosen by the sign of the transformed value.
pub fn inv_yeo_johnson(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda.abs() < 1e-10 {
            y.exp() - 1.0
        } else {
            (lambda * y + 1.0).max(0.0).powf(1.0 / lambda) - 1.0
        }
    } else if (lambda - 2.0).abs() < 1e-10 {
        1.0 - (-y).exp()
    } else {
        1.0 - (1.0 - (2.0 - lambda) * y).max(0.0).powf(1.0 / (2.0 - lambda))
    }
}

/// Grid-search maximum likelihood estimate of lambda over [-2, 2].
fn select_lambda(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1.0;
    }

    let mut best_lambda = 1.0;
    let mut best_llf = f64::NEG_INFINITY;

    for i in -200..=200 {
        let lambda = i as f64 / 100.0;
        let llf = log_likelihood(values, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    // Refine around the best coarse candidate.
    let start = (best_lambda - 0.1).max(-2.0);
    let end = (best_lambda + 0.1).min(2.0);
    for i in 0..=100 {
        let lambda = start + (end - start) * i as f64 / 100.0;
        let llf = log_likelihood(values, lambda);
        if llf > best_llf {
            best_llf = llf;
            best_lambda = lambda;
        }
    }

    best_lambda
}

fn log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    if transformed.iter().any(|v| !v.is_finite()) {
        return f64::NEG_INFINITY;
    }

    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    if variance <= 0.0 {
        return f64::NEG_INFINITY;
    }

    let jacobian: f64 = values
        .iter()
        .map(|&x| x.signum() * (x.abs() + 1.0).ln())
        .sum();

    -0.5 * n * variance.ln() + (lambda - 1.0) * jacobian
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_round_trips() {
        for lambda in [-1.5, 0.0, 0.5, 1.0, 2.0] {
            for x in [-3.0, -0.5, 0.0, 0.7, 4.0] {
                let y = yeo_johnson(x, lambda);
                let back = inv_yeo_johnson(y, lambda);
                assert!((back - x).abs() < 1e-9, "lambda={lambda} x={x} back={back}");
            }
        }
    }

    #[test]
    fn identity_lambda_is_shift() {
        // lambda = 1 leaves the shape untouched (x+1-1 = x).
        assert!((yeo_johnson(3.0, 1.0) - 3.0).abs() < 1e-12);
        assert!((yeo_johnson(-3.0, 1.0) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn fitted_transform_standardizes() {
        let values: Vec<f64> = (1..=40).map(|i| (i as f64).powf(1.7)).collect();
        let pt = PowerTransform::fit(&values);
        let transformed = pt.transform(&values);

        let n = transformed.len() as f64;
        let mean = transformed.iter().sum::<f64>() / n;
        assert!(mean.abs() < 1e-8);

        let recovered = pt.inverse(&transformed);
        for (orig, back) in values.iter().zip(&recovered) {
            assert!((orig - back).abs() < 1e-6 * orig.abs().max(1.0));
        }
    }

    #[test]
    fn skewed_data_gets_contracting_lambda() {
        // Strongly right-skewed data should pull lambda well below 1.
        let values: Vec<f64> = (1..=60).map(|i| (0.25 * i as f64).exp()).collect();
        let pt = PowerTransform::fit(&values);
        assert!(pt.lambda() < 0.5, "lambda={}", pt.lambda());
    }
}
