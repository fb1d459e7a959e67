//! Quantile forecasting of the infant mortality rate
//!
//! Three linear quantile regressors (p10, p50, p90) share one robust scaler
//! and one feature order. [`QuantileEnsemble`] owns all of them together
//! with the post-processing that keeps every band ordered and bounded.

pub mod artifacts;
pub mod ensemble;
pub mod importance;
pub mod regressor;
pub mod scaler;
pub mod training;

pub use artifacts::{TrainingManifest, TrainingMetrics, load_ensemble, load_forecaster, save_artifacts};
pub use ensemble::{
    BandSource, ForecastBounds, Forecaster, HeuristicBand, QUANTILES, QuantileEnsemble,
    QuantileForecast,
};
pub use importance::{FeatureImportance, feature_importance, write_importance_csv};
pub use regressor::{QuantileRegressor, pinball_loss};
pub use scaler::RobustScaler;
pub use training::{TrainingOutcome, train_ensemble};
