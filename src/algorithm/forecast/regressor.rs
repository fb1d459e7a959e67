//! Linear quantile regression
//!
//! Minimises the mean pinball loss plus an L2 penalty on the weights by
//! full-batch sub-gradient descent. The bias starts at the empirical
//! quantile of the target so an untrained model already predicts a
//! sensible constant.

use serde::{Deserialize, Serialize};

use crate::algorithm::stats::percentile;
use crate::config::TrainingConfig;

/// Pinball loss of one prediction at quantile `tau`
#[must_use]
pub fn pinball_loss(actual: f64, predicted: f64, tau: f64) -> f64 {
    let residual = actual - predicted;
    if residual >= 0.0 {
        tau * residual
    } else {
        (tau - 1.0) * residual
    }
}

/// Linear model for one quantile of the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileRegressor {
    /// Quantile in (0, 1)
    pub tau: f64,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl QuantileRegressor {
    /// Fit on scaled inputs `x` and targets `y`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(x: &[Vec<f64>], y: &[f64], tau: f64, config: &TrainingConfig) -> Self {
        let width = x.first().map_or(0, Vec::len);
        let mut model = Self {
            tau,
            weights: vec![0.0; width],
            bias: percentile(y, tau).unwrap_or(0.0),
        };
        if x.is_empty() {
            return model;
        }

        let n = x.len() as f64;
        let mut grad_w = vec![0.0; width];
        for epoch in 0..config.epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (features, target) in x.iter().zip(y) {
                let residual = target - model.predict(features);
                // d(loss)/d(prediction)
                let slope = if residual > 0.0 {
                    -tau
                } else if residual < 0.0 {
                    1.0 - tau
                } else {
                    0.0
                };
                grad_b += slope;
                for (g, value) in grad_w.iter_mut().zip(features) {
                    *g += slope * value;
                }
            }

            let step = config.learning_rate / (1.0 + epoch as f64 / 500.0).sqrt();
            for (weight, g) in model.weights.iter_mut().zip(&grad_w) {
                *weight -= step * (g / n + config.l2 * *weight);
            }
            model.bias -= step * grad_b / n;
        }
        model
    }

    /// Raw prediction for one scaled feature vector
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(weight, value)| weight * value)
                .sum::<f64>()
    }

    /// Mean pinball loss over a sample
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_loss(&self, x: &[Vec<f64>], y: &[f64]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        let total: f64 = x
            .iter()
            .zip(y)
            .map(|(features, target)| pinball_loss(*target, self.predict(features), self.tau))
            .sum();
        total / x.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinball_loss() {
        assert!((pinball_loss(10.0, 8.0, 0.9) - 1.8).abs() < 1e-12);
        assert!((pinball_loss(8.0, 10.0, 0.9) - 0.2).abs() < 1e-12);
        assert_eq!(pinball_loss(5.0, 5.0, 0.5), 0.0);
    }

    #[test]
    fn test_fit_recovers_slope() {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i) / 10.0 - 2.5]).collect();
        let y: Vec<f64> = x.iter().map(|v| 10.0 + 4.0 * v[0]).collect();
        let config = TrainingConfig {
            epochs: 4000,
            learning_rate: 0.1,
            l2: 0.0,
            ..TrainingConfig::default()
        };
        let model = QuantileRegressor::fit(&x, &y, 0.5, &config);
        assert!((model.weights[0] - 4.0).abs() < 0.5, "weight {}", model.weights[0]);
        assert!((model.predict(&[0.0]) - 10.0).abs() < 0.5);
        assert!(model.mean_loss(&x, &y) < 0.5);
    }

    #[test]
    fn test_higher_quantile_predicts_higher() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i % 4)]).collect();
        let y: Vec<f64> = (0..40).map(|i| f64::from(i % 10)).collect();
        let config = TrainingConfig::default();
        let low = QuantileRegressor::fit(&x, &y, 0.1, &config);
        let high = QuantileRegressor::fit(&x, &y, 0.9, &config);
        assert!(high.predict(&[1.5]) > low.predict(&[1.5]));
    }
}
