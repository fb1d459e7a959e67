//! Robust feature scaling (median / interquartile range)

use serde::{Deserialize, Serialize};

use crate::algorithm::stats::{median, percentile};
use crate::error::{PipelineError, Result};

/// Centers each feature on its median and divides by its IQR
///
/// Features with a zero IQR keep a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    /// Fit on a row-major sample
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self> {
        let width = samples
            .first()
            .map(Vec::len)
            .ok_or_else(|| PipelineError::Config("cannot fit a scaler on no samples".into()))?;

        let mut center = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);
        for feature in 0..width {
            let column: Vec<f64> = samples
                .iter()
                .map(|row| row.get(feature).copied().unwrap_or(f64::NAN))
                .collect();
            center.push(median(&column).unwrap_or(0.0));
            let iqr = match (percentile(&column, 0.75), percentile(&column, 0.25)) {
                (Some(upper), Some(lower)) => upper - lower,
                _ => 0.0,
            };
            scale.push(if iqr > 0.0 { iqr } else { 1.0 });
        }
        Ok(Self { center, scale })
    }

    /// Number of features
    #[must_use]
    pub fn width(&self) -> usize {
        self.center.len()
    }

    /// Scale one feature vector
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.width() {
            return Err(PipelineError::Config(format!(
                "scaler expects {} features, got {}",
                self.width(),
                values.len()
            )));
        }
        Ok(values
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(value, (center, scale))| (value - center) / scale)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let samples = vec![
            vec![1.0, 5.0],
            vec![2.0, 5.0],
            vec![3.0, 5.0],
            vec![4.0, 5.0],
            vec![5.0, 5.0],
        ];
        let scaler = RobustScaler::fit(&samples).unwrap();
        assert_eq!(scaler.center, vec![3.0, 5.0]);
        assert_eq!(scaler.scale, vec![2.0, 1.0]);
        assert_eq!(scaler.transform(&[7.0, 6.0]).unwrap(), vec![2.0, 1.0]);
        assert!(scaler.transform(&[1.0]).is_err());
        assert!(RobustScaler::fit(&[]).is_err());
    }
}
