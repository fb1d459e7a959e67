//! Guarded rate arithmetic and plausibility clipping
//!
//! Every derived indicator is `numerator / max(denominator, epsilon) * scale`
//! with a zero denominator giving 0, then clipped to its plausible range.
//! [`RateGuard`] counts each clip per indicator for the quality report.

use std::collections::BTreeMap;

use crate::config::AggregationConfig;

/// Scale of per-mille rates
pub const PER_MILLE: f64 = 1000.0;

/// Scale of percentages
pub const PERCENT: f64 = 100.0;

/// Divide with a zero guard
///
/// Returns 0 when the denominator is not positive or either operand is not
/// finite.
#[must_use]
pub fn guarded_rate(numerator: f64, denominator: f64, scale: f64, epsilon: f64) -> f64 {
    if !(numerator.is_finite() && denominator.is_finite()) || denominator <= 0.0 {
        return 0.0;
    }
    numerator / denominator.max(epsilon) * scale
}

/// Computes rates and clips them, counting clip events per indicator
#[derive(Debug, Clone)]
pub struct RateGuard {
    epsilon: f64,
    utilization_ceiling: f64,
    per_mille_ceiling: f64,
    clips: BTreeMap<&'static str, usize>,
}

impl RateGuard {
    /// Create a guard from the aggregation settings
    #[must_use]
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            epsilon: config.epsilon,
            utilization_ceiling: config.utilization_ceiling,
            per_mille_ceiling: config.per_mille_ceiling,
            clips: BTreeMap::new(),
        }
    }

    /// Share in [0, 100]
    pub fn percent(&mut self, indicator: &'static str, part: f64, whole: f64) -> f64 {
        let value = guarded_rate(part, whole, PERCENT, self.epsilon);
        self.clip(indicator, value, 0.0, PERCENT)
    }

    /// Rate per 1000 in [0, per-mille ceiling]
    pub fn per_mille(&mut self, indicator: &'static str, events: f64, population: f64) -> f64 {
        let value = guarded_rate(events, population, PER_MILLE, self.epsilon);
        self.clip(indicator, value, 0.0, self.per_mille_ceiling)
    }

    /// Utilization ratio in [0, utilization ceiling]
    pub fn ratio(&mut self, indicator: &'static str, numerator: f64, denominator: f64) -> f64 {
        let value = guarded_rate(numerator, denominator, 1.0, self.epsilon);
        self.clip(indicator, value, 0.0, self.utilization_ceiling)
    }

    /// Clip a value to `[low, high]`; NaN becomes `low`
    pub fn clip(&mut self, indicator: &'static str, value: f64, low: f64, high: f64) -> f64 {
        let clipped = if value.is_nan() || value < low {
            low
        } else if value > high {
            high
        } else {
            return value;
        };
        *self.clips.entry(indicator).or_default() += 1;
        clipped
    }

    /// Plausibility ceiling for ratios
    #[must_use]
    pub const fn utilization_ceiling(&self) -> f64 {
        self.utilization_ceiling
    }

    /// Clip events so far
    #[must_use]
    pub const fn clips(&self) -> &BTreeMap<&'static str, usize> {
        &self.clips
    }
}
