//! Training of the quantile ensemble
//!
//! Rows are the reliable municipality-years with a finite target. They are
//! shuffled with a seeded RNG and split into train and test sets, the scaler
//! is fitted on the train split only, and the three quantile models are
//! trained in parallel since they share nothing.

use std::time::Instant;

use chrono::Utc;
use rand::prelude::*;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::algorithm::forecast::artifacts::{TrainingManifest, TrainingMetrics};
use crate::algorithm::forecast::{
    FeatureImportance, ForecastBounds, QUANTILES, QuantileEnsemble, QuantileRegressor,
    RobustScaler, feature_importance,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::{FORECAST_FEATURES, FORECAST_TARGET, FeatureTable, MunicipalityYearFeatures};
use crate::utils::logging::{create_spinner, finish_progress_bar};

/// Fewest usable rows the ensemble is trained on
pub const MIN_TRAINING_ROWS: usize = 5;

/// A trained ensemble with its provenance and feature ranking
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub ensemble: QuantileEnsemble,
    pub manifest: TrainingManifest,
    pub importance: Vec<FeatureImportance>,
}

/// Feature vector and target of one training row
struct Sample {
    features: Vec<f64>,
    neonatal: f64,
    target: f64,
}

impl Sample {
    fn from_row(row: &MunicipalityYearFeatures) -> Option<Self> {
        let target = FORECAST_TARGET.value(row);
        let features = row.vector(&FORECAST_FEATURES);
        (target.is_finite() && features.iter().all(|v| v.is_finite())).then(|| Self {
            features,
            neonatal: row.neonatal_mortality_rate,
            target,
        })
    }
}

/// Number of held-out rows for a sample of `n`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn test_size(n: usize, fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64 * fraction).round() as usize).clamp(1, n - 1)
}

/// Train the ensemble on the reliable rows of `table`
pub fn train_ensemble(table: &FeatureTable, config: &PipelineConfig) -> Result<TrainingOutcome> {
    let start = Instant::now();
    let training = &config.training;

    let mut samples: Vec<Sample> = table.reliable_rows().filter_map(Sample::from_row).collect();
    if samples.len() < MIN_TRAINING_ROWS {
        return Err(PipelineError::model_unavailable(
            "ensemble",
            format!(
                "{} usable reliable municipality-years, at least {MIN_TRAINING_ROWS} are needed to train",
                samples.len()
            ),
        ));
    }
    let observed_max = samples.iter().map(|s| s.target).fold(0.0, f64::max);

    let mut rng = StdRng::seed_from_u64(training.seed);
    samples.shuffle(&mut rng);
    let test = samples.split_off(samples.len() - test_size(samples.len(), training.test_fraction));
    let train = samples;

    let raw: Vec<Vec<f64>> = train.iter().map(|s| s.features.clone()).collect();
    let scaler = RobustScaler::fit(&raw)?;
    let x = raw
        .iter()
        .map(|values| scaler.transform(values))
        .collect::<Result<Vec<_>>>()?;
    let y: Vec<f64> = train.iter().map(|s| s.target).collect();

    let spinner = create_spinner("Training quantile models");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(training.thread_count())
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot build training thread pool: {e}")))?;
    let fitted: Vec<QuantileRegressor> = pool.install(|| {
        QUANTILES
            .par_iter()
            .map(|&tau| QuantileRegressor::fit(&x, &y, tau, training))
            .collect()
    });
    let models: [QuantileRegressor; 3] = fitted
        .try_into()
        .map_err(|_| PipelineError::Config("expected three quantile models".into()))?;
    finish_progress_bar(&spinner, Some("Quantile models trained"));

    for model in &models {
        log::debug!(
            "tau {:.2}: train pinball loss {:.4}",
            model.tau,
            model.mean_loss(&x, &y)
        );
    }

    let ensemble = QuantileEnsemble::new(
        FORECAST_FEATURES.to_vec(),
        scaler,
        models,
        ForecastBounds::new(&config.forecast, Some(observed_max)),
    )?;
    let metrics = evaluate(&ensemble, &test)?;
    log::info!(
        "Trained on {} rows, tested on {}: coverage {:.2}, mean width {:.2}, MAE p50 {:.2} in {:?}",
        train.len(),
        test.len(),
        metrics.coverage,
        metrics.mean_width,
        metrics.mae_p50,
        start.elapsed()
    );

    let manifest = TrainingManifest {
        created_at: Utc::now(),
        target: FORECAST_TARGET.name().to_string(),
        rows_train: train.len(),
        rows_test: test.len(),
        observed_max,
        metrics,
        seed: training.seed,
        epochs: training.epochs,
    };
    let importance = feature_importance(&ensemble);
    Ok(TrainingOutcome {
        ensemble,
        manifest,
        importance,
    })
}

/// Interval coverage, width and per-quantile MAE of repaired forecasts
#[allow(clippy::cast_precision_loss)]
fn evaluate(ensemble: &QuantileEnsemble, test: &[Sample]) -> Result<TrainingMetrics> {
    if test.is_empty() {
        return Ok(TrainingMetrics::default());
    }
    let mut metrics = TrainingMetrics::default();
    for sample in test {
        let forecast = ensemble.forecast_values(&sample.features, sample.neonatal)?;
        if (forecast.p10..=forecast.p90).contains(&sample.target) {
            metrics.coverage += 1.0;
        }
        metrics.mean_width += forecast.width();
        metrics.mae_p10 += (forecast.p10 - sample.target).abs();
        metrics.mae_p50 += (forecast.p50 - sample.target).abs();
        metrics.mae_p90 += (forecast.p90 - sample.target).abs();
    }
    let n = test.len() as f64;
    metrics.coverage /= n;
    metrics.mean_width /= n;
    metrics.mae_p10 /= n;
    metrics.mae_p50 /= n;
    metrics.mae_p90 /= n;
    Ok(metrics)
}
