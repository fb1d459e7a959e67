//! Three-quantile ensemble and its post-processing
//!
//! No caller gets raw model outputs. Every forecast goes through
//! [`ForecastBounds::repair`], which applies in order:
//! 1. clip each output to >= 0 (NaN becomes 0)
//! 2. sort, so p10 <= p50 <= p90
//! 3. raise p10 to the row's neonatal rate and the global floor
//! 4. cap p90 at the ceiling (never below the floor of step 3)
//! 5. widen symmetrically around p50 to the minimum width, shifting the
//!    band up if that pushes p10 under the floor
//!
//! When the models cannot be loaded a [`HeuristicBand`] produces a
//! coefficient-of-variation band instead, marked [`BandSource::Heuristic`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithm::forecast::{QuantileRegressor, RobustScaler};
use crate::config::ForecastConfig;
use crate::error::{PipelineError, Result};
use crate::features::{FORECAST_TARGET, Indicator, MunicipalityYearFeatures};

/// Quantiles of the ensemble, in model order
pub const QUANTILES: [f64; 3] = [0.10, 0.50, 0.90];

/// Where a forecast band came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSource {
    /// Trained quantile models
    Calibrated,
    /// Fixed-CV fallback; the band is not model-calibrated
    Heuristic,
}

impl BandSource {
    /// Label used in output files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calibrated => "calibrated",
            Self::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for BandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, bounded forecast of the infant mortality rate (per 1000)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileForecast {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub source: BandSource,
}

impl QuantileForecast {
    /// Width of the 10-90 band
    #[must_use]
    pub fn width(&self) -> f64 {
        self.p90 - self.p10
    }

    /// Whether the band came from the fallback heuristic
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.source == BandSource::Heuristic
    }
}

/// Domain limits applied to every forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastBounds {
    /// Lowest plausible rate
    pub floor: f64,
    /// Highest plausible p90, the historical maximum when known
    pub ceiling: f64,
    /// Minimum p90 - p10
    pub min_width: f64,
}

impl ForecastBounds {
    /// Bounds from configuration, with an optional observed ceiling
    #[must_use]
    pub fn new(config: &ForecastConfig, observed_ceiling: Option<f64>) -> Self {
        Self {
            floor: config.global_floor.max(0.0),
            ceiling: observed_ceiling
                .filter(|c| c.is_finite() && *c > 0.0)
                .unwrap_or(config.default_ceiling),
            min_width: config.min_width.max(0.0),
        }
    }

    /// Turn three raw outputs into an ordered, bounded band
    #[must_use]
    pub fn repair(&self, raw: [f64; 3], neonatal_rate: f64) -> [f64; 3] {
        let mut band = raw.map(|value| if value.is_nan() { 0.0 } else { value.max(0.0) });
        band.sort_by(f64::total_cmp);
        let [mut p10, mut p50, mut p90] = band;

        let neonatal = if neonatal_rate.is_finite() { neonatal_rate } else { 0.0 };
        let floor = self.floor.max(neonatal);
        p10 = p10.max(floor);
        p50 = p50.max(p10);
        p90 = p90.max(p50);

        let ceiling = self.ceiling.max(floor);
        p90 = p90.min(ceiling);
        p50 = p50.min(p90);
        p10 = p10.min(p50);

        if p90 - p10 < self.min_width {
            p10 = p50 - self.min_width / 2.0;
            if p10 < floor {
                p10 = floor;
            }
            p90 = p10 + self.min_width;
            p50 = p50.clamp(p10, p90);
        }
        [p10, p50, p90]
    }
}

/// Scaler plus the three quantile models, fed by a fixed feature order
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileEnsemble {
    features: Vec<Indicator>,
    scaler: RobustScaler,
    models: [QuantileRegressor; 3],
    bounds: ForecastBounds,
}

impl QuantileEnsemble {
    /// Assemble an ensemble, checking that every part agrees on the width
    pub fn new(
        features: Vec<Indicator>,
        scaler: RobustScaler,
        models: [QuantileRegressor; 3],
        bounds: ForecastBounds,
    ) -> Result<Self> {
        let width = features.len();
        if scaler.width() != width || models.iter().any(|m| m.weights.len() != width) {
            return Err(PipelineError::model_unavailable(
                "ensemble",
                format!("artifacts disagree on the number of features ({width} names)"),
            ));
        }
        Ok(Self {
            features,
            scaler,
            models,
            bounds,
        })
    }

    /// Input features, in model order
    #[must_use]
    pub fn features(&self) -> &[Indicator] {
        &self.features
    }

    #[must_use]
    pub const fn scaler(&self) -> &RobustScaler {
        &self.scaler
    }

    /// Models for p10, p50 and p90
    #[must_use]
    pub const fn models(&self) -> &[QuantileRegressor; 3] {
        &self.models
    }

    #[must_use]
    pub const fn bounds(&self) -> &ForecastBounds {
        &self.bounds
    }

    /// Raw outputs for already scaled inputs
    #[must_use]
    pub fn predict_raw(&self, scaled: &[f64]) -> [f64; 3] {
        [
            self.models[0].predict(scaled),
            self.models[1].predict(scaled),
            self.models[2].predict(scaled),
        ]
    }

    /// Forecast from unscaled feature values in model order
    pub fn forecast_values(&self, values: &[f64], neonatal_rate: f64) -> Result<QuantileForecast> {
        let scaled = self.scaler.transform(values)?;
        let [p10, p50, p90] = self.bounds.repair(self.predict_raw(&scaled), neonatal_rate);
        Ok(QuantileForecast {
            p10,
            p50,
            p90,
            source: BandSource::Calibrated,
        })
    }

    /// Forecast for a feature row
    pub fn forecast(&self, row: &MunicipalityYearFeatures) -> Result<QuantileForecast> {
        self.forecast_values(&row.vector(&self.features), row.neonatal_mortality_rate)
    }
}

/// Fallback band: `point +/- z * cv * point`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicBand {
    cv: f64,
    z: f64,
    baseline: f64,
    bounds: ForecastBounds,
}

impl HeuristicBand {
    /// Band from configuration
    #[must_use]
    pub fn new(config: &ForecastConfig, bounds: ForecastBounds) -> Self {
        Self {
            cv: config.fallback_cv,
            z: config.fallback_z,
            baseline: config.fallback_baseline,
            bounds,
        }
    }

    /// Forecast around the row's observed rate, or the baseline when it has none
    #[must_use]
    pub fn forecast(&self, row: &MunicipalityYearFeatures) -> QuantileForecast {
        let observed = FORECAST_TARGET.value(row);
        let point = if observed.is_finite() && observed > 0.0 {
            observed
        } else {
            self.baseline
        };
        let half_width = self.z * self.cv * point;
        let [p10, p50, p90] = self.bounds.repair(
            [point - half_width, point, point + half_width],
            row.neonatal_mortality_rate,
        );
        QuantileForecast {
            p10,
            p50,
            p90,
            source: BandSource::Heuristic,
        }
    }
}

/// Produces forecasts from the ensemble, or from the heuristic when the
/// ensemble is unavailable
#[derive(Debug, Clone)]
pub struct Forecaster {
    ensemble: Option<QuantileEnsemble>,
    fallback: HeuristicBand,
}

impl Forecaster {
    /// Forecaster backed by trained models
    #[must_use]
    pub fn calibrated(ensemble: QuantileEnsemble, config: &ForecastConfig) -> Self {
        let fallback = HeuristicBand::new(config, *ensemble.bounds());
        Self {
            ensemble: Some(ensemble),
            fallback,
        }
    }

    /// Forecaster without models
    #[must_use]
    pub fn heuristic(config: &ForecastConfig) -> Self {
        Self {
            ensemble: None,
            fallback: HeuristicBand::new(config, ForecastBounds::new(config, None)),
        }
    }

    /// Whether every forecast will be degraded
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.ensemble.is_none()
    }

    /// The trained ensemble, if any
    #[must_use]
    pub const fn ensemble(&self) -> Option<&QuantileEnsemble> {
        self.ensemble.as_ref()
    }

    /// Forecast one row
    #[must_use]
    pub fn forecast(&self, row: &MunicipalityYearFeatures) -> QuantileForecast {
        match &self.ensemble {
            Some(ensemble) => ensemble.forecast(row).unwrap_or_else(|e| {
                log::warn!("Falling back to heuristic band for {}: {}", row.key(), e);
                self.fallback.forecast(row)
            }),
            None => self.fallback.forecast(row),
        }
    }
}
