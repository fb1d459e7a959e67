//! Serialized model artifacts
//!
//! A models directory holds one JSON file per quantile model, the shared
//! scaler, the ordered feature-name list and a training manifest. The
//! feature list is authoritative: inputs are built in exactly that order at
//! inference time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::algorithm::forecast::{
    ForecastBounds, Forecaster, QuantileEnsemble, QuantileRegressor, RobustScaler,
};
use crate::config::ForecastConfig;
use crate::error::util::{ensure_directory, write_string};
use crate::error::{PipelineError, Result};
use crate::features::Indicator;
use crate::utils::logging::log_warning;

/// Model file names, in quantile order
pub const MODEL_FILES: [&str; 3] = ["quantile_p10.json", "quantile_p50.json", "quantile_p90.json"];
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Held-out evaluation of a trained ensemble
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Share of test targets inside [p10, p90]
    pub coverage: f64,
    /// Mean p90 - p10 on the test rows
    pub mean_width: f64,
    pub mae_p10: f64,
    pub mae_p50: f64,
    pub mae_p90: f64,
}

/// Provenance of a models directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub created_at: DateTime<Utc>,
    /// Predicted indicator
    pub target: String,
    pub rows_train: usize,
    pub rows_test: usize,
    /// Largest target value seen in training data, used as the p90 ceiling
    pub observed_max: f64,
    pub metrics: TrainingMetrics,
    pub seed: u64,
    pub epochs: usize,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_string(path, &serde_json::to_string_pretty(value)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write every artifact of a trained ensemble into `dir`
pub fn save_artifacts(
    dir: &Path,
    ensemble: &QuantileEnsemble,
    manifest: &TrainingManifest,
) -> Result<Vec<PathBuf>> {
    ensure_directory(dir)?;
    let mut written = Vec::with_capacity(MODEL_FILES.len() + 3);

    for (file, model) in MODEL_FILES.iter().zip(ensemble.models()) {
        let path = dir.join(file);
        write_json(&path, model)?;
        written.push(path);
    }

    let names: Vec<&str> = ensemble.features().iter().map(|f| f.name()).collect();
    let scaler_path = dir.join(SCALER_FILE);
    write_json(&scaler_path, ensemble.scaler())?;
    let names_path = dir.join(FEATURE_NAMES_FILE);
    write_json(&names_path, &names)?;
    let manifest_path = dir.join(MANIFEST_FILE);
    write_json(&manifest_path, manifest)?;

    written.extend([scaler_path, names_path, manifest_path]);
    Ok(written)
}

/// Read one artifact, reporting any failure as `ModelUnavailable`
fn load_artifact<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    read_json(&dir.join(file)).map_err(|e| PipelineError::model_unavailable(file, e))
}

/// Load the ensemble stored in `dir`
///
/// Any missing or inconsistent artifact yields `ModelUnavailable`. The p90
/// ceiling is the manifest's observed maximum when a manifest is present.
pub fn load_ensemble(dir: &Path, config: &ForecastConfig) -> Result<QuantileEnsemble> {
    let names: Vec<String> = load_artifact(dir, FEATURE_NAMES_FILE)?;
    let features = names
        .iter()
        .map(|name| name.parse::<Indicator>())
        .collect::<Result<Vec<_>>>()
        .map_err(|e| PipelineError::model_unavailable(FEATURE_NAMES_FILE, e))?;

    let scaler: RobustScaler = load_artifact(dir, SCALER_FILE)?;
    let [p10, p50, p90] = MODEL_FILES;
    let models: [QuantileRegressor; 3] = [
        load_artifact(dir, p10)?,
        load_artifact(dir, p50)?,
        load_artifact(dir, p90)?,
    ];

    let observed_max = match load_artifact::<TrainingManifest>(dir, MANIFEST_FILE) {
        Ok(manifest) => Some(manifest.observed_max),
        Err(e) => {
            log::warn!("{e}; using the configured forecast ceiling");
            None
        }
    };

    QuantileEnsemble::new(features, scaler, models, ForecastBounds::new(config, observed_max))
}

/// Forecaster for `dir`, degraded to the heuristic band when the models
/// cannot be loaded
#[must_use]
pub fn load_forecaster(dir: &Path, config: &ForecastConfig) -> Forecaster {
    match load_ensemble(dir, config) {
        Ok(ensemble) => {
            log::info!(
                "Loaded quantile ensemble with {} features from {}",
                ensemble.features().len(),
                dir.display()
            );
            Forecaster::calibrated(ensemble, config)
        }
        Err(e) => {
            log_warning(
                &format!("{e}; forecasts fall back to the heuristic band"),
                Some(dir),
            );
            Forecaster::heuristic(config)
        }
    }
}
